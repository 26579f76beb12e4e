//! People records seeded into the index on startup

use serde::{Deserialize, Serialize};

/// A person document. Keys use the field names the search query targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
}

impl Person {
    fn new(
        id: &str,
        title: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        country: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            country: country.to_string(),
        }
    }
}

/// The fixed dataset, in load order
pub fn seed_people() -> Vec<Person> {
    vec![
        Person::new(
            "1",
            "Mr.",
            "Marco",
            "Franssen",
            "marco.franssen@elasticsearch.com",
            "The Netherlands",
        ),
        Person::new(
            "2",
            "Mr.",
            "John",
            "Doe",
            "john.doe@elasticsearch.com",
            "Neverland",
        ),
        Person::new(
            "3",
            "Mrs.",
            "Jane",
            "Doe",
            "jane.doe@golang.org",
            "Neverland",
        ),
        Person::new("4", "Mr.", "Rob", "Pike", "rob.pike@golang.org", "Unknown"),
    ]
}
