// Copyright (c) 2026 ptdbg Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::env;
use std::path::{Component, Path};

pub fn canonicalize_path(source_path: &str) -> String {
    // 1. Resolve to absolute path
    let path = Path::new(source_path);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().unwrap_or_default().join(path)
    };

    // 2. Use dunce to resolve . and .. and symlinks; paths that do not exist
    // (sources moved since the build) are kept as they are
    let canonical = dunce::canonicalize(&absolute).unwrap_or(absolute);

    // 3. Final Step: Convert to String and FORCE forward slashes
    canonical.to_string_lossy().replace('\\', "/")
}

/// True when both paths name the same file once canonicalized.
pub fn same_file(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a == b || canonicalize_path(a) == canonicalize_path(b))
}

/// True when the components of `query` are a trailing run of the components
/// of `path`. `main.c` and `src/main.c` both match `/home/me/proj/src/main.c`;
/// `in.c` does not.
pub fn path_ends_with(path: &str, query: &str) -> bool {
    let normal = |p: &str| -> Vec<String> {
        Path::new(p)
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    };
    let path = normal(path);
    let query = normal(query);
    !query.is_empty() && path.ends_with(&query)
}

/// Parse hex address from string (supports "0x1234" or "1234" format)
pub fn parse_hex(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    let hex_str = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(hex_str, 16).ok()
}
