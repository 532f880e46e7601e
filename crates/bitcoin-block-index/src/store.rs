use std::collections::BTreeMap;

use crate::error::Result;

/// Read access to an ordered byte-keyed store holding the block index.
pub trait IndexStore {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn contains(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl IndexStore for rusty_leveldb::DB {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(rusty_leveldb::DB::get(self, key).map(|value| value.to_vec()))
    }
}

impl IndexStore for BTreeMap<Vec<u8>, Vec<u8>> {
    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(BTreeMap::get(self, key).cloned())
    }

    fn contains(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.contains_key(key))
    }
}
