use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct MixerFlag {
    pub address: String,
    pub is_mixer: bool,
    pub mixer_type: Option<&'static str>,
}

/// Flags addresses that match a known mixer contract (currently the
/// Tornado Cash pool set). This only checks exact address membership; it
/// does not trace indirect deposits/withdrawals through a mixer.
pub fn flag(addresses: &[String], known_mixers: &HashSet<String>) -> Vec<MixerFlag> {
    let known_mixers_lower: HashSet<String> =
        known_mixers.iter().map(|m| m.to_ascii_lowercase()).collect();

    addresses
        .iter()
        .map(|address| {
            let is_mixer = known_mixers_lower.contains(&address.to_ascii_lowercase());
            MixerFlag {
                address: address.clone(),
                is_mixer,
                mixer_type: is_mixer.then_some("Tornado Cash"),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_known_mixer_address_case_insensitively() {
        let mut known = HashSet::new();
        known.insert("0xAAA".to_owned());
        let flags = flag(&["0xaaa".to_owned(), "0xbbb".to_owned()], &known);
        assert!(flags[0].is_mixer);
        assert!(!flags[1].is_mixer);
        assert_eq!(flags[0].mixer_type, Some("Tornado Cash"));
    }
}
