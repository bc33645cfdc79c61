//! Compilation of a [`DirectoryQuery`] into parameterised SQL.
//!
//! User input only ever reaches SQLite as bound parameters; the statement
//! text is assembled from fixed fragments.

use closerhub_core::directory::{DirectoryQuery, SortMode};
use rusqlite::types::Value;

use crate::encode::{CLOSER_COLUMNS, encode_amount};

/// A statement and its positional parameters.
pub struct CompiledQuery {
  pub sql:    String,
  pub params: Vec<Value>,
}

pub fn compile(query: &DirectoryQuery) -> CompiledQuery {
  let mut conds: Vec<String> = Vec::new();
  let mut params: Vec<Value> = Vec::new();

  for term in &query.product_terms {
    params.push(Value::Text(like_pattern(term)));
    conds.push(format!(
      "EXISTS (SELECT 1 FROM json_each(p.product_types_folded) \
       WHERE json_each.value LIKE ?{} ESCAPE '\\')",
      params.len()
    ));
  }

  let enums = [
    ("p.profile_type", query.profile_type.map(|v| v.as_ref().to_owned())),
    ("p.market", query.market.map(|v| v.as_ref().to_owned())),
    ("p.mission_type", query.mission_type.map(|v| v.as_ref().to_owned())),
  ];
  for (column, value) in enums {
    if let Some(value) = value {
      params.push(Value::Text(value));
      conds.push(format!("{column} = ?{}", params.len()));
    }
  }

  if !query.product_types.is_empty() {
    let mut slots = Vec::with_capacity(query.product_types.len());
    for product in &query.product_types {
      params.push(Value::Text(product.clone()));
      slots.push(format!("?{}", params.len()));
    }
    conds.push(format!(
      "EXISTS (SELECT 1 FROM json_each(p.product_types) \
       WHERE json_each.value IN ({}))",
      slots.join(", ")
    ));
  }

  for term in &query.contract_terms {
    params.push(Value::Text(like_pattern(term)));
    conds.push(format!(
      "EXISTS (SELECT 1 FROM json_each(p.contract_types_folded) \
       WHERE json_each.value LIKE ?{} ESCAPE '\\')",
      params.len()
    ));
  }

  if let Some(min) = query.min_years_experience {
    params.push(Value::Integer(i64::from(min)));
    conds.push(format!("p.years_experience >= ?{}", params.len()));
  }

  if let Some(min) = query.min_total_closed {
    params.push(Value::Integer(encode_amount(min)));
    conds.push(format!("p.total_closed >= ?{}", params.len()));
  }

  let where_clause = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join("\n   AND "))
  };

  let order_by = match query.sort {
    SortMode::Default => "p.is_premium DESC, a.created_at DESC, a.rowid DESC",
    SortMode::Best => {
      "p.is_premium DESC, p.total_closed DESC, a.created_at DESC, a.rowid DESC"
    }
  };

  let sql = format!(
    "SELECT {CLOSER_COLUMNS}
     FROM accounts a
     JOIN closer_profiles p ON p.account_id = a.account_id
     {where_clause}
     ORDER BY {order_by}"
  );

  CompiledQuery { sql, params }
}

/// `%term%` with LIKE metacharacters escaped. `term` is already case-folded
/// by the query builder and is matched against the folded list columns.
fn like_pattern(term: &str) -> String {
  let mut out = String::with_capacity(term.len() + 2);
  out.push('%');
  for ch in term.chars() {
    if matches!(ch, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(ch);
  }
  out.push('%');
  out
}
