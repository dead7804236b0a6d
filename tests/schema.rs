//! Schema checks against the SQLite file the repository creates.

use std::collections::BTreeMap;

use rusqlite::{Connection, Result as SqliteResult};
use sermitsiaq_ingest::config::Settings;
use tempfile::tempdir;

#[derive(Debug)]
struct IndexInfo {
    table: String,
    columns: Vec<String>,
    unique: bool,
    partial: bool,
}

fn extract_indexes(conn: &Connection) -> SqliteResult<BTreeMap<String, IndexInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, tbl_name, sql FROM sqlite_master WHERE type='index' AND sql IS NOT NULL ORDER BY name",
    )?;
    let rows: Vec<(String, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<SqliteResult<Vec<_>>>()?;

    let mut indexes = BTreeMap::new();
    for (name, table, sql) in rows {
        let mut pragma = conn.prepare(&format!("PRAGMA index_info(\"{}\")", name))?;
        let columns = pragma
            .query_map([], |row| row.get::<_, String>(2))?
            .collect::<SqliteResult<Vec<_>>>()?;
        let upper = sql.to_uppercase();
        indexes.insert(
            name,
            IndexInfo {
                table,
                columns,
                unique: upper.contains("UNIQUE"),
                partial: upper.contains(" WHERE "),
            },
        );
    }
    Ok(indexes)
}

/// Unique constraints declared inline show up as autoindexes without SQL.
fn unique_column_sets(conn: &Connection, table: &str) -> SqliteResult<Vec<Vec<String>>> {
    let mut list = conn.prepare(&format!("PRAGMA index_list(\"{}\")", table))?;
    let names: Vec<(String, bool)> = list
        .query_map([], |row| Ok((row.get(1)?, row.get::<_, i64>(2)? == 1)))?
        .collect::<SqliteResult<Vec<_>>>()?;
    let mut sets = Vec::new();
    for (name, _) in names.into_iter().filter(|(_, unique)| *unique) {
        let mut info = conn.prepare(&format!("PRAGMA index_info(\"{}\")", name))?;
        sets.push(
            info.query_map([], |row| row.get::<_, String>(2))?
                .collect::<SqliteResult<Vec<_>>>()?,
        );
    }
    Ok(sets)
}

#[tokio::test]
async fn schema_has_listing_indices() {
    let dir = tempdir().unwrap();
    let settings = Settings::with_data_dir(dir.path().to_path_buf());
    settings.ensure_directories().unwrap();
    let db = settings.open_database().await.unwrap();
    // Opening twice must not fail on existing objects.
    db.init_schema().await.unwrap();
    drop(db);

    let conn = Connection::open(dir.path().join("sermitsiaq.db")).unwrap();
    let indexes = extract_indexes(&conn).unwrap();
    let on_articles = |cols: &[&str]| {
        indexes
            .values()
            .any(|i| i.table == "articles" && i.columns == cols)
    };
    for cols in [
        &["section", "display_order"][..],
        &["is_featured", "display_order"],
        &["is_home", "display_order"],
        &["published_date"],
        &["element_guid"],
        &["language"],
        &["canonical_id"],
    ] {
        assert!(on_articles(cols), "missing articles index on {:?}", cols);
    }

    let url_language = indexes
        .values()
        .find(|i| i.table == "articles" && i.columns == ["published_url", "language"])
        .expect("articles (published_url, language) index");
    assert!(url_language.unique);
    assert!(url_language.partial);

    let detail_unique = unique_column_sets(&conn, "article_details").unwrap();
    assert!(detail_unique
        .iter()
        .any(|cols| cols == &["published_url", "language"]));
}

#[test]
fn detail_pair_is_unique_at_the_storage_level() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("check.db");
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let mut settings = Settings::with_data_dir(dir.path().to_path_buf());
        settings.database_url = Some(format!("sqlite:{}", path.display()));
        settings.open_database().await.unwrap();
    });

    let conn = Connection::open(&path).unwrap();
    let insert = "INSERT INTO article_details (published_url, language, content_blocks, created_at, updated_at) \
                  VALUES ('https://www.sermitsiaq.ag/a/b/1', 'da', '[]', 'now', 'now')";
    conn.execute(insert, []).unwrap();
    assert!(conn.execute(insert, []).is_err());
}
