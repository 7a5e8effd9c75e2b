use invoice_kilos::text_processing::{is_bulk_product, normalize_text, ProductDescription};
use proptest::prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    /// Invoice-like fragments: words, stop words, unit spellings, separators and digits
    fn fragment_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("FRIJOL".to_string()),
            Just("Azúcar".to_string()),
            Just("GRANEL".to_string()),
            Just("AGRANEL".to_string()),
            Just("DE".to_string()),
            Just("A".to_string()),
            Just("G".to_string()),
            Just("GR".to_string()),
            Just("GRAMOS".to_string()),
            Just("KILO".to_string()),
            Just("KG".to_string()),
            Just("ML".to_string()),
            Just("CC".to_string()),
            Just("UND".to_string()),
            Just("*".to_string()),
            Just("/".to_string()),
            Just(" ".to_string()),
            Just("  ".to_string()),
            "[0-9]{1,4}",
            "[a-zñ]{1,6}",
        ]
    }

    fn invoice_name_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(fragment_strategy(), 0..12).prop_map(|parts| parts.concat())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        #[test]
        fn normalization_is_idempotent_on_any_text(raw in ".*") {
            let once = normalize_text(&raw);
            prop_assert_eq!(normalize_text(&once), once);
        }

        #[test]
        fn normalization_is_idempotent_on_invoice_names(raw in invoice_name_strategy()) {
            let once = normalize_text(&raw);
            prop_assert_eq!(normalize_text(&once), once);
        }

        #[test]
        fn every_token_lands_in_exactly_one_bucket(raw in invoice_name_strategy()) {
            let description = ProductDescription::new(&raw);
            let components = &description.components;
            for token in &description.normalized_tokens {
                let buckets = [
                    components.core_words.contains(token),
                    components.measurements.contains(token),
                    components.modifiers.contains(token),
                ];
                prop_assert_eq!(buckets.iter().filter(|hit| **hit).count(), 1, "{:?}", token);
            }
        }

        #[test]
        fn bulk_detection_agrees_everywhere(raw in invoice_name_strategy()) {
            let description = ProductDescription::new(&raw);
            prop_assert_eq!(description.is_bulk(), description.components.is_bulk());
            prop_assert_eq!(description.is_bulk(), is_bulk_product(&raw));
        }
    }
}
