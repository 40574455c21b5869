use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Customer reference record as held by the CRM. Never mutated by the flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub phone: String,
    pub name: String,
    pub address: String,
    pub pan: String,
    pub email: String,
    pub city: String,
    /// Monthly salary in rupees
    pub monthly_salary: u64,
    /// Largest amount grantable without salary verification, in rupees
    pub pre_approved_limit: u64,
    /// Bureau score on the 300-900 scale
    pub credit_score: u16,
}

/// Lookup of customers by normalized phone number
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn lookup_customer(&self, phone: &str) -> Result<Option<Customer>>;
    async fn list(&self) -> Result<Vec<Customer>>;
}

/// In-memory implementation of CustomerDirectory
pub struct InMemoryCustomerDirectory {
    customers: Arc<DashMap<String, Customer>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self {
            customers: Arc::new(DashMap::new()),
        }
    }

    pub fn with_customers(customers: impl IntoIterator<Item = Customer>) -> Self {
        let directory = Self::new();
        for customer in customers {
            directory.insert(customer);
        }
        directory
    }

    pub fn insert(&self, customer: Customer) {
        self.customers.insert(customer.phone.clone(), customer);
    }
}

impl Default for InMemoryCustomerDirectory {
    fn default() -> Self {
        Self::with_customers(demo_customers())
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn lookup_customer(&self, phone: &str) -> Result<Option<Customer>> {
        Ok(self.customers.get(phone).map(|entry| entry.clone()))
    }

    async fn list(&self) -> Result<Vec<Customer>> {
        let mut customers: Vec<Customer> =
            self.customers.iter().map(|entry| entry.clone()).collect();
        customers.sort_by(|a, b| a.phone.cmp(&b.phone));
        Ok(customers)
    }
}

/// PAN check, case-insensitive.
pub fn verify_pan(customer: &Customer, provided: &str) -> bool {
    customer.pan.to_uppercase() == provided.trim().to_uppercase()
}

/// Address check: either string contains the other, ignoring case.
/// A blank address never matches.
pub fn verify_address(customer: &Customer, provided: &str) -> bool {
    let stored = customer.address.to_lowercase();
    let provided = provided.trim().to_lowercase();
    if provided.is_empty() {
        return false;
    }
    stored.contains(&provided) || provided.contains(&stored)
}

/// Seed customers used when no directory is configured
pub fn demo_customers() -> Vec<Customer> {
    vec![
        Customer {
            phone: "9876543210".to_string(),
            name: "Rajesh Kumar".to_string(),
            address: "42 MG Road, Andheri West, Mumbai 400058".to_string(),
            pan: "ABCPK1234F".to_string(),
            email: "rajesh.kumar@example.com".to_string(),
            city: "Mumbai".to_string(),
            monthly_salary: 85_000,
            pre_approved_limit: 500_000,
            credit_score: 780,
        },
        Customer {
            phone: "9123456789".to_string(),
            name: "Priya Sharma".to_string(),
            address: "17 Residency Road, Bengaluru 560025".to_string(),
            pan: "BCDPS5678G".to_string(),
            email: "priya.sharma@example.com".to_string(),
            city: "Bengaluru".to_string(),
            monthly_salary: 60_000,
            pre_approved_limit: 300_000,
            credit_score: 750,
        },
        Customer {
            phone: "8765432109".to_string(),
            name: "Amit Patel".to_string(),
            address: "8 CG Road, Navrangpura, Ahmedabad 380009".to_string(),
            pan: "CDEPP9012H".to_string(),
            email: "amit.patel@example.com".to_string(),
            city: "Ahmedabad".to_string(),
            monthly_salary: 45_000,
            pre_approved_limit: 200_000,
            credit_score: 680,
        },
        Customer {
            phone: "9988776655".to_string(),
            name: "Sneha Reddy".to_string(),
            address: "3 Jubilee Hills, Hyderabad 500033".to_string(),
            pan: "DEFPR3456J".to_string(),
            email: "sneha.reddy@example.com".to_string(),
            city: "Hyderabad".to_string(),
            monthly_salary: 120_000,
            pre_approved_limit: 800_000,
            credit_score: 820,
        },
    ]
}
