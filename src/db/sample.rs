//! 示例销售库：salesperson / timber_sales（扩展版另含 products）
//!
//! 用于本地演示与集成测试；重复调用是幂等的。

use sqlx::sqlite::SqlitePool;

const SALESPERSON: &[(i64, &str, &str)] = &[(1, "John Doe", "North"), (2, "Jane Smith", "South")];

const TIMBER_SALES: &[(i64, i64, f64, &str)] = &[
    (1, 1, 120.0, "2021-01-01"),
    (2, 1, 150.0, "2021-02-01"),
    (3, 2, 180.0, "2021-01-01"),
    (4, 2, 200.0, "2021-02-01"),
    (5, 1, 175.0, "2021-03-01"),
    (6, 2, 195.0, "2021-03-01"),
];

const PRODUCTS: &[(i64, &str, &str, f64)] = &[
    (1, "Pine Logs", "Softwood", 25.50),
    (2, "Oak Logs", "Hardwood", 45.00),
    (3, "Maple Logs", "Hardwood", 40.00),
    (4, "Cedar Logs", "Softwood", 35.00),
];

/// (product_id, sales_id)
const PRODUCT_ASSIGNMENTS: &[(i64, i64)] = &[(1, 1), (2, 2), (3, 3), (4, 4), (1, 5), (2, 6)];

/// 建表并写入示例数据；extended 为 true 时追加 products 表并为每笔销售关联产品
pub async fn create_sample_sales_database(
    pool: &SqlitePool,
    extended: bool,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS salesperson (
            salesperson_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            region TEXT NOT NULL
        )",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS timber_sales (
            sales_id INTEGER PRIMARY KEY,
            salesperson_id INTEGER,
            volume REAL NOT NULL,
            sale_date DATE NOT NULL,
            product_id INTEGER,
            FOREIGN KEY (salesperson_id) REFERENCES salesperson(salesperson_id)
        )",
    )
    .execute(&mut *tx)
    .await?;

    for (id, name, region) in SALESPERSON {
        sqlx::query(
            "INSERT OR IGNORE INTO salesperson (salesperson_id, name, region) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(region)
        .execute(&mut *tx)
        .await?;
    }

    for (id, salesperson_id, volume, date) in TIMBER_SALES {
        sqlx::query(
            "INSERT OR IGNORE INTO timber_sales (sales_id, salesperson_id, volume, sale_date) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(salesperson_id)
        .bind(volume)
        .bind(date)
        .execute(&mut *tx)
        .await?;
    }

    if extended {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS products (
                product_id INTEGER PRIMARY KEY,
                product_name TEXT NOT NULL,
                category TEXT NOT NULL,
                unit_price REAL NOT NULL
            )",
        )
        .execute(&mut *tx)
        .await?;

        for (id, name, category, price) in PRODUCTS {
            sqlx::query(
                "INSERT OR IGNORE INTO products (product_id, product_name, category, unit_price) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(name)
            .bind(category)
            .bind(price)
            .execute(&mut *tx)
            .await?;
        }

        for (product_id, sales_id) in PRODUCT_ASSIGNMENTS {
            sqlx::query("UPDATE timber_sales SET product_id = ? WHERE sales_id = ?")
                .bind(product_id)
                .bind(sales_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    tracing::info!(extended, "sample sales database ready");
    Ok(())
}

/// 校验示例库：两张必需表存在且行数足够
pub async fn verify_sample_database(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
    let salesperson: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM salesperson")
        .fetch_one(pool)
        .await?;
    let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM timber_sales")
        .fetch_one(pool)
        .await?;
    Ok(salesperson >= 2 && sales >= 3)
}
