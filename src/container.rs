//! Registry of open sessions.
//!
//! A [`Container`] keeps at most one [`Handler`] per data file within the
//! process. Paths are compared case-insensitively after resolving them to
//! an absolute form, so `data.csv` and `./DATA.csv` collide.
//!
//! The container is a plain value owned by its caller; methods take
//! `&mut self` and callers sharing it across threads must wrap it in their
//! own lock.

use crate::config::Config;
use crate::context::WaitContext;
use crate::error::{FileError, ForcedUnlockError, Result};
use crate::handler::{Handler, isolated_cleanup};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Open sessions keyed by canonical path.
#[derive(Debug)]
pub struct Container {
    handlers: BTreeMap<String, Handler>,
    sync_on_commit: bool,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
            sync_on_commit: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            handlers: BTreeMap::new(),
            sync_on_commit: config.sync_on_commit,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        canonical_key(path)
            .map(|key| self.handlers.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn get(&self, path: &Path) -> Option<&Handler> {
        let key = canonical_key(path).ok()?;
        self.handlers.get(&key)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Handler> {
        let key = canonical_key(path).ok()?;
        self.handlers.get_mut(&key)
    }

    /// Register `handler`.
    ///
    /// A handler whose path is already registered is force-closed and
    /// [`FileError::AlreadyOpened`] is returned, so a rejected session never
    /// leaks its control files.
    pub fn add(&mut self, mut handler: Handler) -> Result<&mut Handler> {
        let key = match canonical_key(handler.path()) {
            Ok(key) => key,
            Err(e) => return Err(isolated_cleanup(handler, e)),
        };
        handler.set_sync_on_commit(self.sync_on_commit);

        match self.handlers.entry(key) {
            Entry::Occupied(_) => {
                let path = handler.path().to_path_buf();
                Err(isolated_cleanup(handler, FileError::AlreadyOpened(path)))
            }
            Entry::Vacant(slot) => Ok(slot.insert(handler)),
        }
    }

    fn ensure_not_opened(&self, path: &Path) -> Result<()> {
        if self.handlers.contains_key(&canonical_key(path)?) {
            return Err(FileError::AlreadyOpened(path.to_path_buf()));
        }
        Ok(())
    }

    pub fn create_handler_for_read(
        &mut self,
        path: &Path,
        ctx: &WaitContext,
        retry_delay: Duration,
    ) -> Result<&mut Handler> {
        self.ensure_not_opened(path)?;
        let handler = Handler::for_read(path, ctx, retry_delay)?;
        self.add(handler)
    }

    pub fn create_handler_for_create(
        &mut self,
        path: &Path,
        ctx: &WaitContext,
        retry_delay: Duration,
    ) -> Result<&mut Handler> {
        self.ensure_not_opened(path)?;
        let handler = Handler::for_create(path, ctx, retry_delay)?;
        self.add(handler)
    }

    pub fn create_handler_for_update(
        &mut self,
        path: &Path,
        ctx: &WaitContext,
        retry_delay: Duration,
    ) -> Result<&mut Handler> {
        self.ensure_not_opened(path)?;
        let handler = Handler::for_update(path, ctx, retry_delay)?;
        self.add(handler)
    }

    pub fn create_handler_without_lock(&mut self, path: &Path) -> Result<&mut Handler> {
        self.ensure_not_opened(path)?;
        let handler = Handler::without_lock(path)?;
        self.add(handler)
    }

    /// Close the session for `path` and unregister it.
    ///
    /// A session whose close fails stays registered so that
    /// [`Container::close_all_with_errors`] can still force it.
    pub fn close(&mut self, path: &Path) -> Result<()> {
        let key = canonical_key(path)?;
        let Some(handler) = self.handlers.get_mut(&key) else {
            return Ok(());
        };
        handler.close()?;
        self.handlers.remove(&key);
        Ok(())
    }

    /// Commit the session for `path` and unregister it.
    pub fn commit(&mut self, path: &Path) -> Result<()> {
        let key = canonical_key(path)?;
        let Some(handler) = self.handlers.get_mut(&key) else {
            return Ok(());
        };
        handler.commit()?;
        self.handlers.remove(&key);
        Ok(())
    }

    /// Force-close the session for `path`; it is unregistered either way.
    pub fn close_with_errors(&mut self, path: &Path) -> Result<()> {
        let key = canonical_key(path)?;
        match self.handlers.remove(&key) {
            Some(mut handler) => handler.close_with_errors(),
            None => Ok(()),
        }
    }

    /// Close every session, stopping at the first failure.
    pub fn close_all(&mut self) -> Result<()> {
        let keys: Vec<String> = self.handlers.keys().cloned().collect();
        for key in keys {
            if let Some(handler) = self.handlers.get_mut(&key) {
                handler.close()?;
            }
            self.handlers.remove(&key);
        }
        Ok(())
    }

    /// Commit every session, stopping at the first failure.
    pub fn commit_all(&mut self) -> Result<()> {
        let keys: Vec<String> = self.handlers.keys().cloned().collect();
        for key in keys {
            if let Some(handler) = self.handlers.get_mut(&key) {
                handler.commit()?;
            }
            self.handlers.remove(&key);
        }
        Ok(())
    }

    /// Force-close every session and report every failure of every one.
    ///
    /// The container is empty afterwards.
    pub fn close_all_with_errors(&mut self) -> Result<()> {
        let mut errors = ForcedUnlockError::new();
        for (_, mut handler) in std::mem::take(&mut self.handlers) {
            errors.record(handler.close_with_errors());
        }
        errors.into_result()
    }
}

/// Case-insensitive registry key for `path`.
///
/// The parent directory is resolved through symlinks when it exists; the
/// file itself may not exist yet.
fn canonical_key(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path).map_err(|e| FileError::from_io(path, e))?;
    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|dir| dir.join(name))
            .unwrap_or_else(|_| absolute.clone()),
        _ => absolute.clone(),
    };
    Ok(resolved.to_string_lossy().to_uppercase())
}
