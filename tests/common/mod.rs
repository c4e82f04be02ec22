// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides sample models, invoice fixtures and temporary template directories

#![allow(dead_code)]

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

use stencil::template::{Model, Scope, Value};

#[derive(Debug)]
pub struct Address {
    pub street: String,
    pub city: String,
}

impl Model for Address {
    fn class_name(&self) -> &str {
        "Address"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "street" => Some(Value::from(self.street.as_str())),
            "city" => Some(Value::from(self.city.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub address: Arc<Address>,
    pub datetime_created: String,
}

impl Model for Customer {
    fn class_name(&self) -> &str {
        "Customer"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id)),
            "name" => Some(Value::from(self.name.as_str())),
            "email" => Some(Value::from(self.email.as_str())),
            "address" => Some(Value::Model(self.address.clone())),
            "datetime_created" => Some(Value::from(self.datetime_created.as_str())),
            _ => None,
        }
    }
}

/// 2023-08-20 14:05:09 UTC
pub const CREATED_AT: &str = "2023-08-20 14:05:09";

pub fn customer() -> Arc<Customer> {
    customer_named("John Doe")
}

pub fn customer_named(name: &str) -> Arc<Customer> {
    Arc::new(Customer {
        id: 123,
        name: name.to_string(),
        email: "john@doe.com".to_string(),
        address: Arc::new(Address {
            street: "Main Street 12".to_string(),
            city: "Springfield".to_string(),
        }),
        datetime_created: CREATED_AT.to_string(),
    })
}

/// Scope with an unnamed customer model bound as `customer`
pub fn customer_scope() -> Scope {
    Scope::new().with_model(customer())
}

/// Four invoice items whose VAT-inclusive subtotals add up to 40
pub fn invoice_scope() -> Scope {
    let mut scope = Scope::from_json(json!({
        "items": [
            {"description": "Item one", "qty": 1, "priceNetto": 1, "vatPerc": 10},
            {"description": "Item two", "qty": 2, "priceNetto": 2, "vatPerc": 20},
            {"description": "Item three", "qty": 3, "priceNetto": 3, "vatPerc": 30},
            {"description": "Item four", "qty": 4, "priceNetto": 4, "vatPerc": 40}
        ],
        "var_symbol": "0012345678",
        "supplier.name": "My Supplier, Ltd."
    }));
    scope.insert_model(customer());
    scope
}

pub const INVOICE_TEMPLATE: &str = r#"<h2>Invoice items for customer #{{customer.id}} on {{ today }}</h2>
<table>
{{ SET total = 0 }}
{{ SET subtotal = 0 }}
{{for item in items}}
    {{ SET subtotal = item.qty * item.priceNetto * (100 + item.vatPerc) / 100 }}
    {{ if loop.first }}
        {{ SET note = "FIRST LOOP" }}
    {{ elseif loop.last }}
        {{ SET note = "LAST LOOP" }}
    {{ elseif loop.index > 1 }}
        {{ SET note = "NOT FIRST NOR LAST LOOP" }}
    {{ endif }}
    <tr>
        <td> #{{ loop.index }} - {{ note }}</td>
        <td> {{ item.description }} </td>
        <td> {{ item.priceNetto | round(2) }} </td>
        <td> {{ subtotal | round(2) }} &euro; </td>
    </tr>
    {{ SET total = total + subtotal }}
{{ elsefor }}
    <tr><td> EMPTY ITEMS! </td></tr>
{{ endfor }}
</table>
{{ if total > 0 }}
<p>Amount due: <b> {{ total | round(2) }} Eur </b></p>
{{ else }}
<p>DO NOT PAY!</p>
{{ endif }}
{{ if var_symbol }} Invoice VS: {{ var_symbol }} {{ endif }}"#;

pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(format!("{}.out", name))
    }

    pub async fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .expect("Failed to create template directory");
        }
        fs::write(&path, contents)
            .await
            .expect("Failed to write test file");
        path
    }
}
