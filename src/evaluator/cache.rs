// Copyright 2024 OctoFHIR Team
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

//! Parsed-program cache shared by every engine a factory creates

use crate::ast::Program;
use crate::parser::{ParseResult, parse_program};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Source text to parsed program, bounded in size
#[derive(Debug)]
pub struct ProgramCache {
    programs: Mutex<FxHashMap<String, Arc<Program>>>,
    max_size: usize,
}

impl ProgramCache {
    /// Create a cache holding at most `max_size` programs; zero disables caching
    pub fn new(max_size: usize) -> Self {
        Self {
            programs: Mutex::new(FxHashMap::default()),
            max_size,
        }
    }

    /// Return the cached program for `source`, parsing it on a miss
    ///
    /// Parse failures are not cached.
    pub fn get_or_parse(&self, source: &str) -> ParseResult<Arc<Program>> {
        if self.max_size == 0 {
            return parse_program(source).map(Arc::new);
        }

        if let Some(program) = self.programs.lock().get(source) {
            return Ok(Arc::clone(program));
        }

        // Parse outside the lock
        let program = Arc::new(parse_program(source)?);

        let mut programs = self.programs.lock();
        if programs.len() >= self.max_size {
            log::debug!("program cache full ({} entries), clearing", programs.len());
            programs.clear();
        }
        programs.insert(source.to_string(), Arc::clone(&program));
        Ok(program)
    }

    /// Number of cached programs
    pub fn len(&self) -> usize {
        self.programs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.programs.lock().clear();
    }
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hit_returns_same_program() {
        let cache = ProgramCache::new(4);
        let first = cache.get_or_parse("x + 1").unwrap();
        let second = cache.get_or_parse("x + 1").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clears_when_full() {
        let cache = ProgramCache::new(2);
        cache.get_or_parse("1").unwrap();
        cache.get_or_parse("2").unwrap();
        cache.get_or_parse("3").unwrap();

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_parse_errors_not_cached() {
        let cache = ProgramCache::new(2);
        assert!(cache.get_or_parse("x +").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_cache() {
        let cache = ProgramCache::new(0);
        cache.get_or_parse("1").unwrap();
        assert!(cache.is_empty());
    }
}
