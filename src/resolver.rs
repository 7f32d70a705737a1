// 🔀 Record Resolver - reconcile owners across the two stores
//
// Primary wins whenever the same id exists in both stores. Ids are not
// globally unique, so a collision may pair two unrelated records; that is
// reported at debug level and otherwise left alone.

use crate::error::Result;
use crate::owner::Owner;
use crate::store::{RecordStore, Stores};
use std::collections::BTreeMap;
use tracing::debug;

/// Every owner from both stores, one per id, primary preferred.
/// Returned in ascending id order.
pub fn merge_all(stores: &Stores) -> Result<Vec<Owner>> {
    let mut combined: BTreeMap<i64, Owner> = BTreeMap::new();

    for owner in stores.secondary.all_owners()? {
        combined.insert(owner.id, owner);
    }

    for owner in stores.primary.all_owners()? {
        if let Some(shadowed) = combined.insert(owner.id, owner) {
            debug!(
                id = shadowed.id,
                secondary_vehicle = %shadowed.vehicle_no,
                "primary record shadows secondary record"
            );
        }
    }

    Ok(combined.into_values().collect())
}

/// Single-store lookup
pub fn lookup(store: &RecordStore, id: i64) -> Result<Option<Owner>> {
    store.get_owner(id)
}

/// First store (primary, then secondary) holding `id` wins
pub fn resolve(stores: &Stores, id: i64) -> Result<Option<Owner>> {
    for store in stores.lookup_order() {
        if let Some(owner) = lookup(store, id)? {
            debug!(id, store = %store.role(), "resolved owner");
            return Ok(Some(owner));
        }
    }

    debug!(id, "owner absent from both stores");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::new_owner;
    use std::collections::BTreeSet;

    #[test]
    fn test_empty_stores_merge_to_nothing() {
        let stores = Stores::in_memory().unwrap();
        assert!(merge_all(&stores).unwrap().is_empty());
        assert!(resolve(&stores, 1).unwrap().is_none());
    }

    #[test]
    fn test_primary_only_id_resolves_to_primary() {
        let stores = Stores::in_memory().unwrap();
        stores.primary.insert_owner(&new_owner("Primary", "KA01AB1234", "2024-01-10")).unwrap();

        let owner = resolve(&stores, 1).unwrap().unwrap();
        assert_eq!(owner.owner_name, "Primary");
    }

    #[test]
    fn test_secondary_only_id_resolves_to_secondary() {
        let stores = Stores::in_memory().unwrap();
        stores
            .secondary
            .insert_owner_with_id(2, &new_owner("Secondary", "MH12XY9999", "2024-01-10"))
            .unwrap();

        let owner = resolve(&stores, 2).unwrap().unwrap();
        assert_eq!(owner.owner_name, "Secondary");
    }

    #[test]
    fn test_colliding_id_resolves_to_primary_payload() {
        let stores = Stores::in_memory().unwrap();
        stores.primary.insert_owner(&new_owner("Primary", "KA01AB1234", "2024-01-10")).unwrap();
        stores.secondary.insert_owner(&new_owner("Secondary", "MH12XY9999", "2023-05-01")).unwrap();

        let owner = resolve(&stores, 1).unwrap().unwrap();
        assert_eq!(owner.owner_name, "Primary");
        assert_eq!(owner.vehicle_no, "KA01AB1234");
    }

    #[test]
    fn test_merge_is_union_with_primary_on_collision() {
        let stores = Stores::in_memory().unwrap();
        // primary: 1, 2   secondary: 2, 3, 5
        stores.primary.insert_owner(&new_owner("P1", "KA01AA0001", "2024-01-01")).unwrap();
        stores.primary.insert_owner(&new_owner("P2", "KA01AA0002", "2024-01-02")).unwrap();
        stores.secondary.insert_owner_with_id(2, &new_owner("S2", "MH01AA0002", "2024-01-02")).unwrap();
        stores.secondary.insert_owner_with_id(3, &new_owner("S3", "MH01AA0003", "2024-01-03")).unwrap();
        stores.secondary.insert_owner_with_id(5, &new_owner("S5", "MH01AA0005", "2024-01-05")).unwrap();

        let merged = merge_all(&stores).unwrap();

        let ids: BTreeSet<i64> = merged.iter().map(|o| o.id).collect();
        assert_eq!(ids, BTreeSet::from([1, 2, 3, 5]));

        let two = merged.iter().find(|o| o.id == 2).unwrap();
        assert_eq!(two.owner_name, "P2");
        assert_eq!(*two, stores.primary.get_owner(2).unwrap().unwrap());
    }

    #[test]
    fn test_absent_everywhere_is_none_not_error() {
        let stores = Stores::in_memory().unwrap();
        stores.primary.insert_owner(&new_owner("P1", "KA01AA0001", "2024-01-01")).unwrap();

        assert!(resolve(&stores, 99).unwrap().is_none());
    }
}
