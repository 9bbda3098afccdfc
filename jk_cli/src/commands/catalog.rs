use colored::Colorize;
use jk_core::{Category, TestCatalog};
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Layer")]
    layer: u8,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Test")]
    name: String,
    #[tabled(rename = "Category")]
    category: Category,
}

pub fn list() {
    let catalog = TestCatalog::standard();

    println!("{}", "Test catalog".bold().green());
    for layer in &catalog.layers {
        println!("  {}", layer.layer.to_string().bold());
    }

    let rows: Vec<CatalogRow> = catalog
        .iter()
        .map(|(layer, def)| CatalogRow {
            layer: layer.number(),
            id: def.id.clone(),
            name: def.name.clone(),
            category: def.category,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    println!("{} tests", catalog.total_tests().to_string().yellow());
}
