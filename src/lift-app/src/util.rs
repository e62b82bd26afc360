// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Normalize a lift or level name: trimmed, inner whitespace collapsed to `_`.
///
/// Level names are matched verbatim against lift telemetry, so case is kept.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}
