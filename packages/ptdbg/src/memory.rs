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

use crate::utils::same_file;

/// One mapping of the tracee's address space, as listed in `/proc/<pid>/maps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub name: String,
    pub start: u64,
    pub size: u64,
    /// Offset of the mapping into the backing file.
    pub offset: u64,
}

impl MemoryRegion {
    pub fn new(name: String, start: u64, size: u64, offset: u64) -> Self {
        Self {
            name,
            start,
            size,
            offset,
        }
    }
}

/// Runtime base of `executable` in `regions`: the start of its mapping at
/// file offset zero. Falls back to the first mapping, which is where the
/// kernel places the main image.
pub fn image_base(regions: &[MemoryRegion], executable: &str) -> Option<u64> {
    regions
        .iter()
        .find(|r| r.offset == 0 && same_file(&r.name, executable))
        .or_else(|| regions.first())
        .map(|r| r.start)
}
