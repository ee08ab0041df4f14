use crate::access::CachedDbAccess;
use crate::db::{Database, CF_RELATIONS_CHILDREN, CF_RELATIONS_PARENTS};
use crate::errors::DbResult;
use crate::staging::StagingArea;
use consensus_core::Hash;
use std::sync::Arc;

/// Direct parent and child links of the DAG
#[derive(Clone)]
pub struct DbRelationsStore {
    parents_access: CachedDbAccess<Hash, Arc<Vec<Hash>>>,
    children_access: CachedDbAccess<Hash, Arc<Vec<Hash>>>,
}

impl DbRelationsStore {
    pub fn new(db: Arc<Database>, cache_size: usize) -> Self {
        Self {
            parents_access: CachedDbAccess::new(db.clone(), CF_RELATIONS_PARENTS, cache_size),
            children_access: CachedDbAccess::new(db, CF_RELATIONS_CHILDREN, cache_size),
        }
    }

    pub fn get_parents(&self, staging: &StagingArea, hash: Hash) -> DbResult<Arc<Vec<Hash>>> {
        self.parents_access.read(staging, &hash)
    }

    pub fn get_children(&self, staging: &StagingArea, hash: Hash) -> DbResult<Arc<Vec<Hash>>> {
        self.children_access.read(staging, &hash)
    }

    pub fn has(&self, staging: &StagingArea, hash: Hash) -> DbResult<bool> {
        self.parents_access.has(staging, &hash)
    }

    /// Records `hash` with `parents` and links it as a child of each parent.
    /// Parents without a relations row (e.g. trusted proof roots) are skipped.
    pub fn insert(&self, staging: &mut StagingArea, hash: Hash, parents: Arc<Vec<Hash>>) -> DbResult<()> {
        self.parents_access.stage(staging, &hash, &parents)?;
        if !self.children_access.has(staging, &hash)? {
            self.children_access.stage(staging, &hash, &Arc::new(Vec::new()))?;
        }
        for parent in parents.iter() {
            let Some(children) = self.children_access.get(staging, parent)? else { continue };
            if children.contains(&hash) {
                continue;
            }
            let mut children = (*children).clone();
            children.push(hash);
            self.children_access.stage(staging, parent, &Arc::new(children))?;
        }
        Ok(())
    }

    /// Removes `hash` and unlinks it from the children of its retained parents
    pub fn delete(&self, staging: &mut StagingArea, hash: Hash) -> DbResult<()> {
        if let Some(parents) = self.parents_access.get(staging, &hash)? {
            for parent in parents.iter() {
                let Some(children) = self.children_access.get(staging, parent)? else { continue };
                let remaining: Vec<Hash> = children.iter().copied().filter(|child| *child != hash).collect();
                self.children_access.stage(staging, parent, &Arc::new(remaining))?;
            }
        }
        self.parents_access.stage_delete(staging, &hash);
        self.children_access.stage_delete(staging, &hash);
        Ok(())
    }
}
