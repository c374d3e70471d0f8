//! The workspace variable table.

use crate::error::VariableError;
use crate::id::VariableId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableModel {
    pub id: VariableId,
    pub name: String,
    /// Empty string is the untyped default.
    pub var_type: String,
}

/// Name/id pairs in creation order. Names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableMap {
    variables: Vec<VariableModel>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a variable. Creating a name that already exists with the same
    /// type returns the existing one; a different type is a conflict.
    pub fn create(
        &mut self,
        name: &str,
        var_type: &str,
        id: Option<VariableId>,
    ) -> Result<(VariableModel, bool), VariableError> {
        if let Some(existing) = self.by_name(name) {
            if existing.var_type != var_type {
                return Err(VariableError::NameConflict {
                    name: name.to_string(),
                    existing_type: existing.var_type.clone(),
                });
            }
            if let Some(id) = id
                && id != existing.id
            {
                return Err(VariableError::DuplicateId(id));
            }
            return Ok((existing.clone(), false));
        }
        if let Some(id) = id
            && self.by_id(id).is_some()
        {
            return Err(VariableError::DuplicateId(id));
        }
        let model = VariableModel {
            id: id.unwrap_or_else(|| self.fresh_id()),
            name: name.to_string(),
            var_type: var_type.to_string(),
        };
        self.variables.push(model.clone());
        Ok((model, true))
    }

    fn fresh_id(&self) -> VariableId {
        loop {
            let id = VariableId::generate();
            if self.by_id(id).is_none() {
                return id;
            }
        }
    }

    pub fn by_id(&self, id: VariableId) -> Option<&VariableModel> {
        self.variables.iter().find(|v| v.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&VariableModel> {
        self.variables
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    pub fn by_name_and_type(&self, name: &str, var_type: &str) -> Option<&VariableModel> {
        self.by_name(name).filter(|v| v.var_type == var_type)
    }

    /// Returns the old name.
    pub fn rename(&mut self, id: VariableId, new_name: &str) -> Result<String, VariableError> {
        if let Some(other) = self.by_name(new_name)
            && other.id != id
        {
            return Err(VariableError::NameConflict {
                name: new_name.to_string(),
                existing_type: other.var_type.clone(),
            });
        }
        let var = self
            .variables
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(VariableError::UnknownVariable(id))?;
        Ok(std::mem::replace(&mut var.name, new_name.to_string()))
    }

    pub fn delete(&mut self, id: VariableId) -> Result<VariableModel, VariableError> {
        let pos = self
            .variables
            .iter()
            .position(|v| v.id == id)
            .ok_or(VariableError::UnknownVariable(id))?;
        Ok(self.variables.remove(pos))
    }

    pub fn all(&self) -> &[VariableModel] {
        &self.variables
    }

    pub fn clear(&mut self) {
        self.variables.clear();
    }

    /// A name not yet used, e.g. `i`, `j`, ... then `i2`.
    pub fn unique_name(&self) -> String {
        let letters = "ijkmnopqrstuvwxyzabcdefgh";
        let mut suffix = 0usize;
        loop {
            for ch in letters.chars() {
                let candidate = if suffix == 0 {
                    ch.to_string()
                } else {
                    format!("{ch}{suffix}")
                };
                if self.by_name(&candidate).is_none() {
                    return candidate;
                }
            }
            suffix += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent_per_name() {
        let mut map = VariableMap::new();
        let (a, created) = map.create("count", "", None).unwrap();
        assert!(created);
        let (b, created) = map.create("COUNT", "", None).unwrap();
        assert!(!created);
        assert_eq!(a.id, b.id);
        assert!(matches!(
            map.create("count", "Number", None),
            Err(VariableError::NameConflict { .. })
        ));
    }

    #[test]
    fn rename_rejects_taken_names() {
        let mut map = VariableMap::new();
        let (a, _) = map.create("a", "", None).unwrap();
        map.create("b", "", None).unwrap();
        assert!(map.rename(a.id, "B").is_err());
        assert_eq!(map.rename(a.id, "c").unwrap(), "a");
        assert_eq!(map.by_id(a.id).unwrap().name, "c");
    }

    #[test]
    fn unique_name_skips_used() {
        let mut map = VariableMap::new();
        map.create("i", "", None).unwrap();
        assert_eq!(map.unique_name(), "j");
    }
}
