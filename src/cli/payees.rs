use comfy_table::{Cell, Table};

use super::cards::open_db;
use crate::error::Result;
use crate::store;

pub fn add(name: &str) -> Result<()> {
    let conn = open_db()?;
    let payee = store::add_payee(&conn, name)?;
    println!("Added payee: {} ({})", payee.name, payee.id);
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let payees = store::list_payees(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name"]);
    for payee in payees {
        table.add_row(vec![Cell::new(payee.id), Cell::new(payee.name)]);
    }
    println!("Payees\n{table}");
    Ok(())
}
