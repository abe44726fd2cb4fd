//! Namespaced map bindings: one declared property, many cells.
//!
//! Entry `key` of map `name` lives in cell `name[key]`. Every entry shares
//! the element property's codec and default. The set of written keys is not
//! tracked, so there is no enumeration; callers must know their keys.
//!
//! Keys are not validated. A key can produce a cell name that another
//! property also uses.

use std::fmt;

use crate::binding::Property;
use crate::container::PrefContainer;
use crate::error::Result;


/// Cell name of entry `key` in map `name`.
pub fn entry_cell_name(name: &str, key: &str) -> String {
    format!("{}[{}]", name, key)
}


/// A property bound to one container as a keyed family of cells.
pub struct PrefMap<T> {
    container: PrefContainer,
    element: Property<T>,
}

impl<T> PrefMap<T> {
    pub fn new(container: PrefContainer, element: Property<T>) -> Self {
        PrefMap { container, element }
    }

    pub fn name(&self) -> &str {
        self.element.name()
    }

    pub fn cell_name(&self, key: &str) -> String {
        entry_cell_name(self.element.name(), key)
    }

    pub fn get(&self, key: &str) -> Result<T> {
        self.element.read_cell(&self.container, &self.cell_name(key))
    }

    pub fn set(&self, key: &str, value: T) -> Result<()> {
        self.element
            .write_cell(&self.container, &self.cell_name(key), value)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.element.remove_cell(&self.container, &self.cell_name(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.container.store().contains(&self.cell_name(key))
    }
}

impl<T> fmt::Debug for PrefMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefMap")
            .field("container", &self.container.name())
            .field("element", &self.element)
            .finish()
    }
}
