use tracing::{debug, warn};

use backoffice_cache::merge::{replace_by_id, shallow_merge};
use backoffice_cache::{CacheKey, CacheStore};
use backoffice_types::{EntityPatch, EventEnvelope, PatchError};

/// What a default merge touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub per_id_written: bool,
    pub collection_replaced: bool,
    /// A known field carried an unexpected type. The payload was merged anyway.
    pub mistyped: bool,
}

/// Upsert the envelope's payload into `[...cache_key, id]` (shallow merge
/// over any prior entry) and replace the element with the same `id` in the
/// collection at `cache_key`. The collection never grows. The two writes are
/// independent.
///
/// Only a payload that is not an object or whose `id` is not a string is
/// refused. A field that does not match its entity's patch type is logged
/// and written as received.
pub fn apply_default_merge(
    cache: &dyn CacheStore,
    cache_key: &CacheKey,
    envelope: &EventEnvelope,
) -> Result<MergeOutcome, PatchError> {
    let entity = envelope.entity;
    let payload = &envelope.payload;
    if !payload.is_object() {
        return Err(PatchError::NotAnObject { entity });
    }
    let mut outcome = MergeOutcome::default();

    let Some(id) = envelope.id.as_deref() else {
        if payload.get("id").is_some_and(|id| !id.is_null()) {
            return Err(PatchError::InvalidId { entity });
        }
        debug!("{} update without id, nothing to merge", entity);
        return Ok(outcome);
    };

    if let Err(e) = EntityPatch::decode(entity, payload) {
        warn!("{} update {} merged as received: {}", entity, id, e);
        outcome.mistyped = true;
    }

    cache.set_query_data(&cache_key.child(id), &mut |prior| {
        outcome.per_id_written = true;
        Some(shallow_merge(prior, payload))
    });

    cache.set_query_data(cache_key, &mut |collection| {
        let replaced = collection.and_then(|items| replace_by_id(items, payload));
        outcome.collection_replaced = replaced.is_some();
        replaced
    });

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_cache::QueryCache;
    use backoffice_types::EntityKind;
    use serde_json::{Value, json};

    fn shipments() -> CacheKey {
        CacheKey::from(["shipments"])
    }

    fn merge(cache: &QueryCache, entity: EntityKind, key: &CacheKey, payload: Value) -> Result<MergeOutcome, PatchError> {
        apply_default_merge(cache, key, &EventEnvelope::new(entity, payload))
    }

    #[test]
    fn replaces_collection_row_and_writes_per_id() {
        let cache = QueryCache::new();
        cache.insert(
            shipments(),
            json!([{ "id": "S1", "status": "Pendente" }, { "id": "S2", "status": "Confirmado" }]),
        );

        let payload = json!({ "id": "S1", "status": "Finalizado" });
        let outcome =
            merge(&cache, EntityKind::Shipment, &shipments(), payload.clone()).unwrap();

        assert_eq!(outcome, MergeOutcome { per_id_written: true, collection_replaced: true, mistyped: false });
        assert_eq!(
            cache.get_query_data(&shipments()),
            Some(json!([{ "id": "S1", "status": "Finalizado" }, { "id": "S2", "status": "Confirmado" }]))
        );
        assert_eq!(cache.get_query_data(&shipments().child("S1")), Some(payload));
    }

    #[test]
    fn per_id_entry_is_merged() {
        let cache = QueryCache::new();
        let key = CacheKey::from(["routes"]);
        cache.insert(key.child("R1"), json!({ "id": "R1", "a": 1, "b": 2 }));

        merge(&cache, EntityKind::Route, &key, json!({ "id": "R1", "b": 3, "c": 4 }))
            .unwrap();
        assert_eq!(
            cache.get_query_data(&key.child("R1")),
            Some(json!({ "id": "R1", "a": 1, "b": 3, "c": 4 }))
        );
    }

    #[test]
    fn unknown_id_does_not_grow_collection() {
        let cache = QueryCache::new();
        let initial = json!([{ "id": "S1", "status": "Pendente" }]);
        cache.insert(shipments(), initial.clone());

        let payload = json!({ "id": "S3", "status": "Pendente" });
        let outcome =
            merge(&cache, EntityKind::Shipment, &shipments(), payload.clone()).unwrap();

        assert!(!outcome.collection_replaced);
        assert_eq!(cache.get_query_data(&shipments()), Some(initial));
        assert_eq!(cache.get_query_data(&shipments().child("S3")), Some(payload));
    }

    #[test]
    fn missing_collection_stays_missing() {
        let cache = QueryCache::new();
        merge(&cache, EntityKind::Driver, &CacheKey::from(["drivers"]), json!({ "id": "D1" }))
            .unwrap();
        assert!(cache.get_query_data(&CacheKey::from(["drivers"])).is_none());
        assert!(cache.get_query_data(&CacheKey::from(["drivers", "D1"])).is_some());
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let cache = QueryCache::new();
        cache.insert(shipments(), json!([{ "id": "S1", "status": "Pendente" }]));
        cache.insert(shipments().child("S1"), json!({ "id": "S1", "status": "Pendente", "code": "OP-7" }));
        let payload = json!({ "id": "S1", "status": "Confirmado" });

        merge(&cache, EntityKind::Shipment, &shipments(), payload.clone()).unwrap();
        let collection = cache.get_query_data(&shipments());
        let entry = cache.get_query_data(&shipments().child("S1"));

        merge(&cache, EntityKind::Shipment, &shipments(), payload.clone()).unwrap();
        assert_eq!(cache.get_query_data(&shipments()), collection);
        assert_eq!(cache.get_query_data(&shipments().child("S1")), entry);
        assert_eq!(entry, Some(json!({ "id": "S1", "status": "Confirmado", "code": "OP-7" })));
    }

    #[test]
    fn payload_without_id_changes_nothing() {
        let cache = QueryCache::new();
        cache.insert(shipments(), json!([{ "id": "S1" }]));

        let outcome =
            merge(&cache, EntityKind::Shipment, &shipments(), json!({ "status": "Pendente" }))
                .unwrap();
        assert_eq!(outcome, MergeOutcome::default());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unlisted_status_is_still_written() {
        let cache = QueryCache::new();
        cache.insert(shipments(), json!([{ "id": "S1", "status": "Pendente" }]));

        let payload = json!({ "id": "S1", "status": "Em separação", "quantity": 12.0, "scheduledAt": "2024-05-10" });
        let outcome = merge(&cache, EntityKind::Shipment, &shipments(), payload.clone()).unwrap();

        assert_eq!(outcome, MergeOutcome { per_id_written: true, collection_replaced: true, mistyped: false });
        assert_eq!(cache.get_query_data(&shipments()), Some(json!([payload.clone()])));
        assert_eq!(cache.get_query_data(&shipments().child("S1")), Some(payload));
    }

    #[test]
    fn mistyped_field_is_flagged_but_merged() {
        let cache = QueryCache::new();
        let drivers = CacheKey::from(["drivers"]);
        cache.insert(drivers.clone(), json!([{ "id": "D1", "latitude": -23.5 }]));

        let outcome = merge(&cache, EntityKind::Driver, &drivers, json!({ "id": "D1", "latitude": "far" })).unwrap();

        assert!(outcome.mistyped);
        assert!(outcome.per_id_written && outcome.collection_replaced);
        assert_eq!(cache.get_query_data(&drivers), Some(json!([{ "id": "D1", "latitude": "far" }])));
    }

    #[test]
    fn non_object_or_non_string_id_is_refused() {
        let cache = QueryCache::new();
        let drivers = CacheKey::from(["drivers"]);

        let err = merge(&cache, EntityKind::Driver, &drivers, json!([{ "id": "D1" }])).unwrap_err();
        assert!(matches!(err, PatchError::NotAnObject { entity: EntityKind::Driver }));

        let err = merge(&cache, EntityKind::Driver, &drivers, json!({ "id": 7 })).unwrap_err();
        assert!(matches!(err, PatchError::InvalidId { entity: EntityKind::Driver }));
        assert!(cache.is_empty());
    }
}
