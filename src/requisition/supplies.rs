//! Consumables implied by a prescription's delivery system.
//!
//! Infusion sets are `set` entries matched by name fragment and bottles are
//! matched by supply type alone. The first active catalog entry that fits wins.

use crate::nutrition::{InfusionMode, Supply, SupplyType};

/// Infusion set for the given mode, if the catalog has one
pub fn infusion_set(supplies: &[Supply], mode: InfusionMode) -> Option<&Supply> {
    let keywords = mode.supply_keywords();
    supplies
        .iter()
        .filter(|s| s.is_active && s.supply_type == SupplyType::Set)
        .find(|s| {
            let name = s.name.to_lowercase();
            keywords.iter().any(|k| name.contains(k))
        })
}

pub fn bottle(supplies: &[Supply]) -> Option<&Supply> {
    supplies
        .iter()
        .find(|s| s.is_active && s.supply_type == SupplyType::Bottle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supply(id: &str, name: &str, supply_type: SupplyType, is_active: bool) -> Supply {
        Supply {
            id: id.to_string(),
            code: None,
            name: name.to_string(),
            supply_type,
            is_active,
            unit_price: 1.0,
        }
    }

    #[test]
    fn test_first_matching_set_wins() {
        let catalog = vec![
            supply("s-1", "Enteral bottle 500ml", SupplyType::Bottle, true),
            supply("s-2", "Equipo Bomba Infusao", SupplyType::Set, true),
            supply("s-3", "Pump set premium", SupplyType::Set, true),
            supply("s-4", "Equipo Gravitacional", SupplyType::Set, true),
        ];
        assert_eq!(infusion_set(&catalog, InfusionMode::Pump).unwrap().id, "s-2");
        assert_eq!(infusion_set(&catalog, InfusionMode::Gravity).unwrap().id, "s-4");
        assert_eq!(bottle(&catalog).unwrap().id, "s-1");
    }

    #[test]
    fn test_bottle_named_after_mode_is_not_a_set() {
        let catalog = vec![
            supply("s-1", "Frasco gravitacional 300ml", SupplyType::Bottle, true),
            supply("s-2", "Equipo gravitacional", SupplyType::Set, true),
        ];
        assert_eq!(infusion_set(&catalog, InfusionMode::Gravity).unwrap().id, "s-2");
        assert_eq!(bottle(&catalog).unwrap().id, "s-1");
    }

    #[test]
    fn test_inactive_supplies_are_skipped() {
        let catalog = vec![
            supply("s-1", "Old bottle", SupplyType::Bottle, false),
            supply("s-2", "Gravity set", SupplyType::Set, false),
        ];
        assert!(bottle(&catalog).is_none());
        assert!(infusion_set(&catalog, InfusionMode::Gravity).is_none());
    }
}
