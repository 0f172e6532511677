//! The surebet tracker's migratable tables, in dependency order.
//!
//! Adding a table: append it with the next `dependency_order`, after every
//! table it references.

use super::schema::{ColumnDescriptor as Col, ColumnType, IndexDescriptor, TableDescriptor};

const ID: Col = Col::new("id", ColumnType::Varchar)
    .primary_key()
    .default("gen_random_uuid()");

const CREATED_AT: Col = Col::new("created_at", ColumnType::Timestamp { precision: None })
    .default("NOW()");

const fn money(name: &'static str) -> Col {
    Col::new(
        name,
        ColumnType::Numeric {
            precision: 10,
            scale: 2,
        },
    )
}

pub const USERS: TableDescriptor = TableDescriptor {
    name: "users",
    dependency_order: 1,
    columns: &[
        ID,
        Col::new("email", ColumnType::Text).not_null().unique(),
        Col::new("password", ColumnType::Text).not_null(),
        Col::new("name", ColumnType::Text).not_null(),
        Col::new("role", ColumnType::Text).not_null().default("'user'"),
        CREATED_AT,
    ],
    indexes: &[],
};

pub const ACCOUNT_HOLDERS: TableDescriptor = TableDescriptor {
    name: "account_holders",
    dependency_order: 2,
    columns: &[
        ID,
        Col::new("user_id", ColumnType::Varchar).references("users"),
        Col::new("name", ColumnType::Text).not_null(),
        Col::new("email", ColumnType::Text),
        Col::new("username", ColumnType::Text),
        CREATED_AT,
    ],
    indexes: &[IndexDescriptor {
        name: "idx_account_holders_user",
        column: "user_id",
    }],
};

pub const BETTING_HOUSES: TableDescriptor = TableDescriptor {
    name: "betting_houses",
    dependency_order: 3,
    columns: &[
        ID,
        Col::new("user_id", ColumnType::Varchar).references("users"),
        Col::new("name", ColumnType::Text).not_null(),
        Col::new("notes", ColumnType::Text),
        Col::new("account_holder_id", ColumnType::Varchar).references("account_holders"),
        CREATED_AT,
    ],
    indexes: &[IndexDescriptor {
        name: "idx_betting_houses_user",
        column: "user_id",
    }],
};

pub const SUREBET_SETS: TableDescriptor = TableDescriptor {
    name: "surebet_sets",
    dependency_order: 4,
    columns: &[
        ID,
        Col::new("user_id", ColumnType::Varchar).references("users"),
        Col::new("event_date", ColumnType::Timestamp { precision: None }),
        Col::new("sport", ColumnType::Text),
        Col::new("league", ColumnType::Text),
        Col::new("team_a", ColumnType::Text),
        Col::new("team_b", ColumnType::Text),
        Col::new(
            "profit_percentage",
            ColumnType::Numeric {
                precision: 5,
                scale: 2,
            },
        ),
        Col::new("status", ColumnType::Text).default("'pending'"),
        Col::new("is_checked", ColumnType::Boolean).default("false"),
        CREATED_AT,
    ],
    indexes: &[IndexDescriptor {
        name: "idx_surebet_sets_user",
        column: "user_id",
    }],
};

pub const BETS: TableDescriptor = TableDescriptor {
    name: "bets",
    dependency_order: 5,
    columns: &[
        ID,
        Col::new("surebet_set_id", ColumnType::Varchar).references("surebet_sets"),
        Col::new("betting_house_id", ColumnType::Varchar).references("betting_houses"),
        Col::new("bet_type", ColumnType::Text).not_null(),
        Col::new(
            "odd",
            ColumnType::Numeric {
                precision: 8,
                scale: 3,
            },
        )
        .not_null(),
        money("stake").not_null(),
        money("potential_profit").not_null(),
        Col::new("result", ColumnType::Text),
        money("actual_profit"),
        CREATED_AT,
    ],
    indexes: &[IndexDescriptor {
        name: "idx_bets_surebet_set",
        column: "surebet_set_id",
    }],
};

pub const SESSION: TableDescriptor = TableDescriptor {
    name: "session",
    dependency_order: 6,
    columns: &[
        Col::new("sid", ColumnType::Varchar).not_null().primary_key(),
        Col::new("sess", ColumnType::Json).not_null(),
        Col::new("expire", ColumnType::Timestamp { precision: Some(6) }).not_null(),
    ],
    indexes: &[IndexDescriptor {
        name: "idx_session_expire",
        column: "expire",
    }],
};

/// All tables, parents first.
pub const SUREBET_TABLES: [TableDescriptor; 6] = [
    USERS,
    ACCOUNT_HOLDERS,
    BETTING_HOUSES,
    SUREBET_SETS,
    BETS,
    SESSION,
];
