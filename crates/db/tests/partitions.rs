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


//! Writes to partitioned collections land in the partition chosen by the feature id, and stay
//! readable through the collection's head relation.

mod support;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessera_db::{
        CollectionSpec, ExecutedOp, ExecutorChoice, SqliteSession, WriteOp, WriteRequest,
        WriteSession, partition_number,
    };

    use crate::support::{count, create, engine, head, road, write, written};

    const PARTITIONS: u16 = 4;

    fn ids() -> Vec<String> {
        (0..24).map(|i| format!("feature-{i}")).collect()
    }

    fn expected_counts() -> Vec<i64> {
        let mut counts = vec![0; PARTITIONS as usize];
        for id in ids() {
            counts[partition_number(&id, PARTITIONS) as usize] += 1;
        }
        counts
    }

    fn partition_counts(engine: &mut WriteSession<SqliteSession>) -> Vec<i64> {
        (0..PARTITIONS)
            .map(|p| count(engine, &format!("foo$p{p:03}")))
            .collect()
    }

    #[test]
    fn test_rows_land_in_their_partition() {
        let mut engine = engine();
        create(
            &mut engine,
            "foo",
            CollectionSpec::default().with_partitions(PARTITIONS),
        );

        let ops = ids().iter().map(|id| WriteOp::insert("foo", road(id, "A"))).collect();
        let rows = write(&mut engine, ops);
        for row in &rows {
            let store = written(row).meta.store_number;
            assert_eq!(store.partition_number(), partition_number(&row.id, PARTITIONS));
        }
        engine.commit().unwrap();

        assert_eq!(partition_counts(&mut engine), expected_counts());
        assert_eq!(count(&mut engine, "foo"), 24);
        assert_eq!(engine.reader().scan_head("foo").unwrap().len(), 24);
    }

    #[test]
    fn test_bulk_writes_across_partitions() {
        let mut engine = engine();
        create(
            &mut engine,
            "foo",
            CollectionSpec::default().with_partitions(PARTITIONS),
        );
        let ops = ids().iter().map(|id| WriteOp::insert("foo", road(id, "A"))).collect();
        let response = engine.write(WriteRequest::new(ops).with_executor(ExecutorChoice::Bulk));
        assert!(response.is_success(), "{response:?}");
        engine.commit().unwrap();

        let ops = ids()
            .iter()
            .enumerate()
            .map(|(i, id)| match i % 3 {
                0 => WriteOp::update("foo", road(id, "B")),
                1 => WriteOp::delete("foo", id),
                _ => WriteOp::purge("foo", id),
            })
            .collect();
        let rows = engine
            .write(WriteRequest::new(ops).with_executor(ExecutorChoice::Bulk))
            .into_result()
            .unwrap();
        assert_eq!(rows[0].op, ExecutedOp::Updated);
        assert_eq!(rows[1].op, ExecutedOp::Deleted);
        assert_eq!(rows[2].op, ExecutedOp::Purged);
        engine.commit().unwrap();

        assert_eq!(count(&mut engine, "foo"), 8);
        assert_eq!(count(&mut engine, "foo$del"), 8);
        // Updates and deletes archive one state each, purges two.
        assert_eq!(count(&mut engine, "foo$hst"), 8 + 8 + 16);

        let updated = head(&mut engine, "foo", "feature-0").unwrap();
        assert_eq!(updated.meta.change_count, 2);
        assert_eq!(
            updated.meta.store_number.partition_number(),
            partition_number("feature-0", PARTITIONS)
        );
    }
}
