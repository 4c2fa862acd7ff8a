// Copyright (C) 2026 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//


//! Feature writes through the instant executor: the life of a feature across head, del and
//! history, atomic checks, and request-level validation.

mod support;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessera_common::{Action, Guid, StoreNumber, TupleNumber, Version};
    use tessera_db::{
        CATALOG_COLLECTION, Collection, CollectionSpec, ExecutedOp, Response, WriteError, WriteOp,
        WriteRequest,
    };

    use crate::support::{count, create, engine, head, road, write, written};

    #[test]
    fn test_feature_lifecycle() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());

        let rows = write(&mut engine, vec![WriteOp::insert("foo", road("f1", "Main"))]);
        assert_eq!(rows[0].op, ExecutedOp::Created);
        let v1 = written(&rows[0]).meta.version;
        assert_eq!(written(&rows[0]).meta.action(), Action::Created);
        engine.commit().unwrap();

        let rows = write(&mut engine, vec![WriteOp::update("foo", road("f1", "High"))]);
        assert_eq!(rows[0].op, ExecutedOp::Updated);
        let v2 = written(&rows[0]).meta.version;
        assert_eq!(v2, v1.next());
        engine.commit().unwrap();

        let current = head(&mut engine, "foo", "f1").unwrap();
        assert_eq!(current.meta.version, v2);
        assert_eq!(current.meta.prev_version, Some(v1));
        assert_eq!(current.meta.change_count, 2);
        let history = engine.reader().history("foo", "f1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].meta.version, v1);
        assert_eq!(history[0].meta.next_version, Some(v2));

        let rows = write(&mut engine, vec![WriteOp::delete("foo", "f1")]);
        assert_eq!(rows[0].op, ExecutedOp::Deleted);
        let v3 = written(&rows[0]).meta.version;
        engine.commit().unwrap();

        assert_eq!(head(&mut engine, "foo", "f1"), None);
        let tombstone = engine.reader().deleted("foo", "f1").unwrap().unwrap();
        assert_eq!(tombstone.meta.version, v3);
        assert_eq!(tombstone.meta.action(), Action::Deleted);
        assert!(tombstone.feature.is_some(), "tombstone keeps the last payload");
        let versions: Vec<Version> = engine
            .reader()
            .history("foo", "f1")
            .unwrap()
            .iter()
            .map(|t| t.meta.version)
            .collect();
        assert_eq!(versions, vec![v1, v2]);

        let rows = write(&mut engine, vec![WriteOp::purge("foo", "f1")]);
        assert_eq!(rows[0].op, ExecutedOp::Purged);
        engine.commit().unwrap();

        assert_eq!(count(&mut engine, "foo$del"), 0);
        let history = engine.reader().history("foo", "f1").unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].meta.version, v3);
        assert_eq!(history[2].meta.action(), Action::Deleted);
    }

    #[test]
    fn test_versions_increase_within_one_transaction() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());

        let rows = write(
            &mut engine,
            vec![
                WriteOp::insert("foo", road("f2", "B")),
                WriteOp::insert("foo", road("f1", "A")),
            ],
        );
        let first = engine.current_txn().unwrap();
        // Results follow the request; uids follow processing order.
        assert_eq!(rows[0].id, "f2");
        assert_eq!(written(&rows[0]).meta.uid, 1);
        assert_eq!(written(&rows[1]).meta.uid, 0);
        assert_eq!(written(&rows[1]).meta.version, first);

        // Same database transaction, next request.
        let rows = write(&mut engine, vec![WriteOp::update("foo", road("f1", "A2"))]);
        let meta = &written(&rows[0]).meta;
        assert!(meta.version > first, "{} after {first}", meta.version);
        assert_eq!(meta.version, engine.current_txn().unwrap());
        assert_eq!(meta.uid, 0);
        assert_eq!(meta.prev_version, Some(first));
        assert_eq!(meta.puid, Some(0));
        let second = meta.version;

        let rows = write(&mut engine, vec![WriteOp::delete("foo", "f1")]);
        let tombstone = &written(&rows[0]).meta;
        assert!(tombstone.version > second);
        assert_eq!(tombstone.prev_version, Some(second));
        engine.commit().unwrap();

        let history = engine.reader().history("foo", "f1").unwrap();
        let chain: Vec<(Version, Option<Version>)> = history
            .iter()
            .map(|t| (t.meta.version, t.meta.next_version))
            .collect();
        assert_eq!(
            chain,
            vec![(first, Some(second)), (second, Some(tombstone.version))]
        );
    }

    #[test]
    fn test_scenario_version_numbers() {
        let mut engine = engine();
        let foo = Collection::new("foo", 0, CollectionSpec::default());
        let rows = write(
            &mut engine,
            vec![
                WriteOp::insert(CATALOG_COLLECTION, foo.to_feature()),
                WriteOp::insert("foo", road("f1", "Main")),
            ],
        );
        assert_eq!(rows[1].op, ExecutedOp::Created);
        assert_eq!(written(&rows[1]).meta.version, Version(1));
        engine.commit().unwrap();

        let rows = write(&mut engine, vec![WriteOp::update("foo", road("f1", "High"))]);
        assert_eq!(rows[0].op, ExecutedOp::Updated);
        assert_eq!(written(&rows[0]).meta.version, Version(2));
        engine.commit().unwrap();
        let current = head(&mut engine, "foo", "f1").unwrap();
        assert_eq!(current.meta.prev_version, Some(Version(1)));
        let history = engine.reader().history("foo", "f1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].meta.version, Version(1));
        assert_eq!(history[0].meta.next_version, Some(Version(2)));

        let rows = write(&mut engine, vec![WriteOp::delete("foo", "f1")]);
        assert_eq!(rows[0].op, ExecutedOp::Deleted);
        engine.commit().unwrap();
        assert_eq!(head(&mut engine, "foo", "f1"), None);
        assert_eq!(count(&mut engine, "foo$del"), 1);
        let tombstone = engine.reader().deleted("foo", "f1").unwrap().unwrap();
        assert_eq!(tombstone.meta.version, Version(3));
        assert_eq!(count(&mut engine, "foo$hst"), 2);

        let rows = write(&mut engine, vec![WriteOp::purge("foo", "f1")]);
        assert_eq!(rows[0].op, ExecutedOp::Purged);
        engine.commit().unwrap();
        assert_eq!(count(&mut engine, "foo$del"), 0);
        let versions: Vec<Version> = engine
            .reader()
            .history("foo", "f1")
            .unwrap()
            .iter()
            .map(|t| t.meta.version)
            .collect();
        assert_eq!(versions, vec![Version(1), Version(2), Version(3)]);
        let purged = engine.reader().history("foo", "f1").unwrap().remove(2);
        assert_eq!(purged.meta.next_version, Some(Version(4)));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());

        let rows = write(&mut engine, vec![WriteOp::insert("foo", road("f1", "A"))]);
        let version = written(&rows[0]).meta.version;
        engine.rollback().unwrap();
        assert_eq!(head(&mut engine, "foo", "f1"), None);

        // The transaction number is handed out again.
        let rows = write(&mut engine, vec![WriteOp::insert("foo", road("f1", "A"))]);
        assert_eq!(written(&rows[0]).meta.version, version);
    }

    #[test]
    fn test_upsert() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());

        let rows = write(&mut engine, vec![WriteOp::upsert("foo", road("f1", "A"))]);
        assert_eq!(rows[0].op, ExecutedOp::Created);
        engine.commit().unwrap();
        let rows = write(&mut engine, vec![WriteOp::upsert("foo", road("f1", "B"))]);
        assert_eq!(rows[0].op, ExecutedOp::Updated);
        engine.commit().unwrap();
        assert_eq!(count(&mut engine, "foo$hst"), 1);
    }

    #[test]
    fn test_atomic_update() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());
        let rows = write(&mut engine, vec![WriteOp::insert("foo", road("f1", "A"))]);
        let first = rows[0].guid().unwrap();
        engine.commit().unwrap();

        let rows = write(
            &mut engine,
            vec![WriteOp::update("foo", road("f1", "B")).atomic(first.clone())],
        );
        assert_eq!(rows[0].op, ExecutedOp::Updated);
        engine.commit().unwrap();

        let response = engine.write(WriteRequest::new(vec![
            WriteOp::update("foo", road("f1", "C")).atomic(first),
        ]));
        let error = response.error().unwrap();
        assert!(matches!(error, WriteError::AtomicConflict { .. }));
        assert_eq!(error.code().as_str(), "CHECK_VIOLATION");
        engine.rollback().unwrap();
        assert_eq!(count(&mut engine, "foo$hst"), 1);
    }

    #[test]
    fn test_atomic_delete_of_missing_feature() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());
        let rows = write(&mut engine, vec![WriteOp::insert("foo", road("f1", "A"))]);
        let guid = rows[0].guid().unwrap();
        write(&mut engine, vec![WriteOp::purge("foo", "f1")]);
        engine.commit().unwrap();

        let response = engine.write(WriteRequest::new(vec![
            WriteOp::delete("foo", "f1").atomic(guid),
        ]));
        match response.error() {
            Some(WriteError::AtomicConflict { actual, .. }) => assert_eq!(actual, "absent"),
            other => panic!("expected an atomic conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_and_existing_features() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());

        let rows = write(&mut engine, vec![WriteOp::delete("foo", "nope")]);
        assert_eq!(rows[0].op, ExecutedOp::Retained);
        assert_eq!(rows[0].tuple, None);

        let response = engine.write(WriteRequest::new(vec![WriteOp::update(
            "foo",
            road("nope", "A"),
        )]));
        assert_eq!(response.error().unwrap().code().as_str(), "NOT_FOUND");

        write(&mut engine, vec![WriteOp::insert("foo", road("f1", "A"))]);
        let response = engine.write(WriteRequest::new(vec![WriteOp::insert(
            "foo",
            road("f1", "A"),
        )]));
        assert!(matches!(
            response.error(),
            Some(WriteError::FeatureExists { .. })
        ));
    }

    #[test]
    fn test_request_validation() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());

        let response = engine.write(WriteRequest::new(vec![
            WriteOp::insert("foo", road("f1", "A")),
            WriteOp::delete("foo", "f1"),
        ]));
        assert_eq!(
            response.error(),
            Some(&WriteError::DuplicateOperation {
                collection: "foo".to_string(),
                id: "f1".to_string()
            })
        );
        assert_eq!(engine.current_txn(), None);

        let response = engine.write(WriteRequest::new(vec![WriteOp::insert(
            "bar",
            road("f1", "A"),
        )]));
        assert_eq!(
            response.error(),
            Some(&WriteError::CollectionNotFound("bar".to_string()))
        );

        let guid = Guid::new(
            "foo",
            "f9",
            TupleNumber::new(StoreNumber::from_raw(0), Version(1), 0),
        );
        let response = engine.write(WriteRequest::new(vec![
            WriteOp::insert("foo", road("f9", "A")).atomic(guid),
        ]));
        assert_eq!(response.error().unwrap().code().as_str(), "ILLEGAL_ARGUMENT");
    }

    #[test]
    fn test_auto_purge() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default().with_auto_purge());
        write(&mut engine, vec![WriteOp::insert("foo", road("f1", "A"))]);
        engine.commit().unwrap();

        let rows = write(&mut engine, vec![WriteOp::delete("foo", "f1")]);
        assert_eq!(rows[0].op, ExecutedOp::Purged);
        engine.commit().unwrap();

        assert_eq!(head(&mut engine, "foo", "f1"), None);
        assert_eq!(count(&mut engine, "foo$del"), 0);
        let history = engine.reader().history("foo", "f1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].meta.action(), Action::Created);
        assert_eq!(history[1].meta.action(), Action::Deleted);
    }

    #[test]
    fn test_no_results_keeps_metadata() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());
        let response = engine.write(
            WriteRequest::new(vec![WriteOp::insert("foo", road("f1", "A"))]).without_results(),
        );
        let Response::Success(rows) = response else {
            panic!("write failed: {response:?}");
        };
        let tuple = rows[0].tuple.as_ref().unwrap();
        assert_eq!(tuple.meta.id, "f1");
        assert_eq!(tuple.feature, None);
        assert_eq!(tuple.geo, None);

        let stored = head(&mut engine, "foo", "f1").unwrap();
        assert!(stored.feature.is_some());
        assert!(stored.geo_ref.is_some());
        assert_ne!(stored.meta.geo_grid, 0);
    }

    #[test]
    fn test_recreate_after_delete() {
        let mut engine = engine();
        create(&mut engine, "foo", CollectionSpec::default());
        write(&mut engine, vec![WriteOp::insert("foo", road("f1", "A"))]);
        engine.commit().unwrap();
        write(&mut engine, vec![WriteOp::delete("foo", "f1")]);
        engine.commit().unwrap();
        assert_eq!(count(&mut engine, "foo$del"), 1);

        let rows = write(&mut engine, vec![WriteOp::insert("foo", road("f1", "B"))]);
        assert_eq!(rows[0].op, ExecutedOp::Created);
        engine.commit().unwrap();
        assert_eq!(count(&mut engine, "foo$del"), 0);
        assert_eq!(head(&mut engine, "foo", "f1").unwrap().meta.prev_version, None);
    }
}
