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

//! Test doubles shared by the unit tests.

use std::sync::Arc;

use tessera_common::{
    Action, FeatureEncoding, Flags, GeoEncoding, Metadata, StoreNumber, TagsEncoding, Tuple,
    Version,
};

use crate::dialect::{Dialect, SqliteDialect};
use crate::session::{
    ArgType, BatchOutcome, Cursor, Plan, SessionError, SqlSession, SqlValue,
};

/// A session that records statements instead of running them.
#[derive(Default)]
pub struct RecordingSession {
    executed: Vec<(String, Vec<SqlValue>)>,
    batches: Vec<(String, Vec<Vec<SqlValue>>)>,
    affected: Option<usize>,
    fail_on: Option<String>,
    pub commits: usize,
    pub rollbacks: usize,
}

impl RecordingSession {
    /// Every statement reports this many affected rows (default one).
    pub fn affecting(mut self, affected: usize) -> Self {
        self.affected = Some(affected);
        self
    }

    /// Statements containing `fragment` fail with a constraint violation.
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    pub fn executed(&self) -> &[(String, Vec<SqlValue>)] {
        &self.executed
    }

    pub fn batches(&self) -> &[(String, Vec<Vec<SqlValue>>)] {
        &self.batches
    }

    fn fails(&self, sql: &str) -> bool {
        self.fail_on.as_ref().is_some_and(|f| sql.contains(f.as_str()))
    }
}

impl SqlSession for RecordingSession {
    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(SqliteDialect)
    }

    fn execute(&mut self, sql: &str, args: &[SqlValue]) -> Result<Cursor, SessionError> {
        self.executed.push((sql.to_string(), args.to_vec()));
        if self.fails(sql) {
            return Err(SessionError::ConstraintViolation(sql.to_string()));
        }
        Ok(Cursor::with_affected(self.affected.unwrap_or(1)))
    }

    fn prepare(&mut self, sql: &str, arg_types: &[ArgType]) -> Result<Plan, SessionError> {
        Ok(Plan::new(sql, arg_types))
    }

    fn execute_batch(&mut self, plan: &Plan) -> Result<Vec<BatchOutcome>, SessionError> {
        self.batches
            .push((plan.sql().to_string(), plan.batches().to_vec()));
        let fails = self.fails(plan.sql());
        Ok(plan
            .batches()
            .iter()
            .enumerate()
            .map(|(i, _)| match (fails, i) {
                (true, 0) => BatchOutcome::Failed("constraint failed".to_string()),
                (true, _) => BatchOutcome::NotExecuted,
                (false, _) => BatchOutcome::Applied(self.affected.unwrap_or(1)),
            })
            .collect())
    }

    fn commit(&mut self) -> Result<(), SessionError> {
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SessionError> {
        self.rollbacks += 1;
        Ok(())
    }
}

/// A minimal head tuple for feature `id`.
pub fn tuple(id: &str) -> Tuple {
    Tuple {
        meta: Metadata {
            store_number: StoreNumber::from_raw(256),
            version: Version(1),
            uid: 0,
            id: id.to_string(),
            prev_version: None,
            puid: None,
            next_version: None,
            created_at: 0,
            updated_at: 0,
            author_ts: 0,
            author: None,
            app_id: "test".to_string(),
            feature_type: None,
            origin: None,
            flags: Flags::new(GeoEncoding::GeoJson, FeatureEncoding::Json, TagsEncoding::Json)
                .with_action(Action::Created),
            hash: 0,
            change_count: 1,
            geo_grid: 0,
        },
        feature: Some(b"{}".to_vec()),
        tags: None,
        geo: None,
        geo_ref: None,
        attachment: None,
    }
}
