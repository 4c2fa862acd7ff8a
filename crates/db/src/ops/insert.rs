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

use tessera_common::Tuple;

use crate::catalog::WriteTarget;
use crate::error::WriteError;
use crate::executor::WriteExecutor;
use crate::row_updater::{self, NewRow, WriteContext};

/// Writes the first state of a feature. A tombstone left by an earlier delete is cleared first; a
/// live head row with the same id makes the insert fail.
pub(crate) fn insert_feature(
    ctx: &mut WriteContext,
    executor: &mut dyn WriteExecutor,
    target: &WriteTarget,
    row: NewRow,
) -> Result<Tuple, WriteError> {
    let tuple = row_updater::insert(ctx, target.store_number()?, row);
    executor.remove_stale_del(target, tuple.id())?;
    executor.insert_head(target, &tuple)?;
    Ok(tuple)
}
