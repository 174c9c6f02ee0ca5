//! In-memory employee directory backing the protected demo API.
//!
//! Nothing is persisted; the table lives as long as the process.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Employee {
    pub id: u64,
    pub name: String,
    pub email: Option<String>,
    pub department: Option<String>,
}

/// Body of create and update requests.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmployeeInput {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub department: Option<String>,
}

impl EmployeeInput {
    fn into_employee(self, id: u64) -> Employee {
        Employee {
            id,
            name: self.name,
            email: self.email,
            department: self.department,
        }
    }
}

struct Table {
    next_id: u64,
    rows: BTreeMap<u64, Employee>,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

/// Shared handle to the employee table. Clones see the same data.
#[derive(Clone, Default)]
pub struct EmployeeStore {
    table: Arc<RwLock<Table>>,
}

impl EmployeeStore {
    /// All employees, ordered by id.
    pub async fn list(&self) -> Vec<Employee> {
        self.table.read().await.rows.values().cloned().collect()
    }

    pub async fn get(&self, id: u64) -> Option<Employee> {
        self.table.read().await.rows.get(&id).cloned()
    }

    /// Insert with the next free id.
    pub async fn create(&self, input: EmployeeInput) -> Employee {
        let mut table = self.table.write().await;
        let id = table.next_id;
        table.next_id += 1;

        let employee = input.into_employee(id);
        table.rows.insert(id, employee.clone());
        employee
    }

    /// Replace an existing employee. `None` if the id is unknown.
    pub async fn update(&self, id: u64, input: EmployeeInput) -> Option<Employee> {
        let mut table = self.table.write().await;
        let slot = table.rows.get_mut(&id)?;
        *slot = input.into_employee(id);
        Some(slot.clone())
    }

    pub async fn delete(&self, id: u64) -> Option<Employee> {
        self.table.write().await.rows.remove(&id)
    }
}
