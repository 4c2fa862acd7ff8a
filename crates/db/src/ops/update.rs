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
use crate::row_updater::{self, NewRow, WriteContext};

/// Supersedes the head state `previous`. The outgoing state is archived to history (when the
/// collection keeps history) before the head row is overwritten.
pub(crate) fn update_feature(
    ctx: &mut WriteContext,
    executor: &mut dyn WriteExecutor,
    target: &WriteTarget,
    row: NewRow,
    previous: &Metadata,
) -> Result<Tuple, WriteError> {
    let tuple = row_updater::update(
        ctx,
        target.collection_id(),
        target.store_number()?,
        row,
        previous,
    )?;
    if target.collection.history_enabled() {
        executor.copy_head_to_history(target, &previous.id, tuple.meta.version)?;
    }
    executor.update_head(target, &tuple, previous)?;
    Ok(tuple)
}
