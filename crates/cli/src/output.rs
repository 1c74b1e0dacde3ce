//! Table and JSON rendering of resolution results.

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

use persondir_core::{AttributeSet, AttributeValue, CacheKey};

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn join_values(values: &[AttributeValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn person_table(person: &AttributeSet) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Attribute", "Values"]);
    for (name, values) in person.attributes().iter() {
        table.add_row(vec![Cell::new(name), Cell::new(join_values(values))]);
    }
    table
}

fn person_json(person: &AttributeSet) -> Result<serde_json::Value> {
    let attributes =
        serde_json::to_value(person.attributes()).context("failed to serialize attributes")?;
    Ok(json!({
        "name": person.name(),
        "attributes": attributes,
    }))
}

pub fn print_person(person: &AttributeSet, json: bool) -> Result<()> {
    if json {
        return print_json(&person_json(person)?);
    }
    println!(
        "Person: {}",
        person.name().unwrap_or_else(|| "(unresolved)".to_string())
    );
    println!("{}", person_table(person));
    Ok(())
}

pub fn print_people(people: &[AttributeSet], json: bool) -> Result<()> {
    if json {
        let people = people.iter().map(person_json).collect::<Result<Vec<_>>>()?;
        return print_json(&serde_json::Value::Array(people));
    }
    println!("{} matching people", people.len());
    for person in people {
        println!();
        print_person(person, false)?;
    }
    Ok(())
}

pub fn print_not_found(message: &str, json: bool) {
    if json {
        println!("null");
    } else {
        println!("{message}");
    }
}

pub fn print_attribute_names(possible: Vec<String>, queryable: Vec<String>, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({
            "possible_attribute_names": possible,
            "available_query_attributes": queryable,
        }));
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Attribute", "Returned", "Queryable"]);

    let mut names = possible.clone();
    for name in &queryable {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    for name in &names {
        let mark = |set: &[String]| if set.contains(name) { "yes" } else { "-" };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(mark(&possible)),
            Cell::new(mark(&queryable)),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn print_cache_key(operation: &str, key: Option<CacheKey>, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({
            "operation": operation,
            "key": key.map(|k| k.to_string()),
            "checksum": key.map(|k| k.checksum),
            "hash_code": key.map(|k| k.hash_code),
        }));
    }
    match key {
        Some(key) => println!("{key}"),
        None => println!("no key: no key-contributing attributes for {operation}"),
    }
    Ok(())
}
