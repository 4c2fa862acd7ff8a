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

use tessera_common::{Metadata, Tuple};

use crate::catalog::WriteTarget;
use crate::error::WriteError;
use crate::executor::WriteExecutor;
use crate::row_updater::{self, WriteContext};

/// Moves the head state `previous` to del under a tombstone and removes it from head. Returns
/// the tombstone, without payload.
pub(crate) fn delete_feature(
    ctx: &mut WriteContext,
    executor: &mut dyn WriteExecutor,
    target: &WriteTarget,
    previous: &Metadata,
) -> Result<Tuple, WriteError> {
    let tombstone = row_updater::delete(ctx, target.collection_id(), previous)?;
    executor.remove_stale_del(target, &previous.id)?;
    executor.copy_head_to_del(target, &tombstone)?;
    if target.collection.history_enabled() {
        executor.copy_head_to_history(target, &previous.id, tombstone.version)?;
    }
    executor.delete_head(target, previous)?;
    Ok(metadata_only(tombstone))
}

/// Removes a feature entirely, whether it is live (`head`) or already deleted. Whatever state is
/// removed is archived to history first.
pub(crate) fn purge_feature(
    ctx: &mut WriteContext,
    executor: &mut dyn WriteExecutor,
    target: &WriteTarget,
    id: &str,
    head: Option<&Metadata>,
    deleted: Option<&Metadata>,
) -> Result<Tuple, WriteError> {
    let history = target.collection.history_enabled();
    match (head, deleted) {
        (Some(previous), _) => {
            let tombstone = row_updater::delete(ctx, target.collection_id(), previous)?;
            if history {
                executor.copy_head_to_history(target, &previous.id, tombstone.version)?;
            }
            executor.remove_stale_del(target, &previous.id)?;
            executor.copy_head_to_del(target, &tombstone)?;
            if history {
                executor.copy_del_to_history(
                    target,
                    &previous.id,
                    row_updater::purge_version(ctx, &tombstone),
                )?;
            }
            executor.delete_head(target, previous)?;
            executor.purge_del(target, &previous.id)?;
            Ok(metadata_only(tombstone))
        }
        (None, Some(tombstone)) => {
            if history {
                executor.copy_del_to_history(
                    target,
                    &tombstone.id,
                    row_updater::purge_version(ctx, tombstone),
                )?;
            }
            executor.purge_del(target, &tombstone.id)?;
            Ok(metadata_only(tombstone.clone()))
        }
        (None, None) => Err(WriteError::FeatureNotFound {
            collection: target.collection_id().to_string(),
            id: id.to_string(),
        }),
    }
}

fn metadata_only(meta: Metadata) -> Tuple {
    Tuple {
        meta,
        feature: None,
        tags: None,
        geo: None,
        geo_ref: None,
        attachment: None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tessera_common::{Action, Version};

    use super::*;
    use crate::catalog::{Collection, CollectionSpec};
    use crate::executor::InstantExecutor;
    use crate::testing::{RecordingSession, tuple};

    fn statements(
        spec: CollectionSpec,
        run: impl FnOnce(&mut dyn WriteExecutor, &WriteTarget),
    ) -> Vec<String> {
        let mut session = RecordingSession::default();
        let target = Arc::new(Collection::new("roads", 0, spec)).write_target(0, 1, false);
        {
            let mut executor = InstantExecutor::new(&mut session);
            run(&mut executor, &target);
        }
        session
            .executed()
            .iter()
            .map(|(sql, _)| sql.split(" (").next().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_delete_statements() {
        let previous = tuple("f1").meta;
        let executed = statements(CollectionSpec::default(), |executor, target| {
            let mut ctx = WriteContext::new(Version(2), 10, None, "app");
            let tombstone = delete_feature(&mut ctx, executor, target, &previous).unwrap();
            assert_eq!(tombstone.meta.action(), Action::Deleted);
            assert!(tombstone.feature.is_none());
        });
        assert_eq!(
            executed,
            vec![
                "DELETE FROM \"roads$del\" WHERE \"id\" = ?",
                "INSERT INTO \"roads$del\"",
                "INSERT INTO \"roads$hst\"",
                "DELETE FROM \"roads\" WHERE \"id\" = ? AND \"version\" = ? AND \"uid\" = ?",
            ]
        );
    }

    #[test]
    fn test_delete_without_history() {
        let previous = tuple("f1").meta;
        let spec = CollectionSpec::default().without_history();
        let executed = statements(spec, |executor, target| {
            let mut ctx = WriteContext::new(Version(2), 10, None, "app");
            delete_feature(&mut ctx, executor, target, &previous).unwrap();
        });
        assert!(!executed.iter().any(|s| s.contains("$hst")));
        assert_eq!(executed.len(), 3);
    }

    #[test]
    fn test_purge_of_deleted_feature() {
        let mut tombstone = tuple("f1").meta;
        tombstone.flags = tombstone.flags.with_action(Action::Deleted);
        let executed = statements(CollectionSpec::default(), |executor, target| {
            let mut ctx = WriteContext::new(Version(2), 10, None, "app");
            let purged =
                purge_feature(&mut ctx, executor, target, "f1", None, Some(&tombstone)).unwrap();
            assert_eq!(purged.meta, tombstone);
        });
        assert_eq!(
            executed,
            vec![
                "INSERT INTO \"roads$hst\"",
                "DELETE FROM \"roads$del\" WHERE \"id\" = ?",
            ]
        );
    }

    #[test]
    fn test_purge_of_live_feature() {
        let previous = tuple("f1").meta;
        let executed = statements(CollectionSpec::default(), |executor, target| {
            let mut ctx = WriteContext::new(Version(2), 10, None, "app");
            purge_feature(&mut ctx, executor, target, "f1", Some(&previous), None).unwrap();
        });
        assert_eq!(executed.len(), 6);
        assert_eq!(executed[0], "INSERT INTO \"roads$hst\"");
        assert_eq!(executed[5], "DELETE FROM \"roads$del\" WHERE \"id\" = ?");
    }
}
