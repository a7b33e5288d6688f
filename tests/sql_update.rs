//! Integration tests for the SQL `UPDATE` adapter.

use std::any::Any;

use mapforge::prelude::*;
use mapforge::reflect_struct;
use mapforge::sql::{build_update_command, ChangeTracker, DbSettings, SqlCommand, SqlParam};

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct UserRow {
        pub id: i64,
        pub name: String,
        pub age: i32,
    }
}

fn sample_row() -> UserRow {
    UserRow {
        id: 7,
        name: "a".to_string(),
        age: 30,
    }
}

struct FixedChanges(Vec<&'static str>);

impl ChangeTracker for FixedChanges {
    fn changes(&self, _obj: &dyn Any) -> Vec<String> {
        self.0.iter().map(|c| (*c).to_string()).collect()
    }
}

/// A change tracker narrows the SET list to the changed members; id fields
/// form the WHERE clause and bind after the SET parameters.
#[test]
fn test_update_with_change_tracker() -> Result<()> {
    let mut cmd = SqlCommand::default();
    let tracker = FixedChanges(vec!["Name"]);

    let emitted = build_update_command(
        &mut cmd,
        &sample_row(),
        "users",
        &["Id"],
        None,
        None,
        Some(&tracker),
        &DbSettings::postgres(),
    )?;

    assert!(emitted);
    assert_eq!(cmd.text, "UPDATE users SET \"NAME\"=@NAME WHERE \"ID\"=@ID");
    assert_eq!(
        cmd.parameters,
        vec![
            ("NAME".to_string(), SqlParam::Text("a".to_string())),
            ("ID".to_string(), SqlParam::Int(7)),
        ]
    );
    Ok(())
}

/// No tracked changes: the operation yields `false` and emits nothing.
#[test]
fn test_update_no_changes() -> Result<()> {
    let mut cmd = SqlCommand::default();
    let tracker = FixedChanges(Vec::new());

    let emitted = build_update_command(
        &mut cmd,
        &sample_row(),
        "users",
        &["Id"],
        None,
        None,
        Some(&tracker),
        &DbSettings::postgres(),
    )?;

    assert!(!emitted);
    assert!(cmd.text.is_empty());
    assert!(cmd.parameters.is_empty());
    Ok(())
}

/// Without tracker or include list, every member except the ids is SET, in
/// declaration order.
#[test]
fn test_update_all_columns() -> Result<()> {
    let mut cmd = SqlCommand::default();

    let emitted = build_update_command(
        &mut cmd,
        &sample_row(),
        "users",
        &["Id"],
        None,
        None,
        None,
        &DbSettings::postgres(),
    )?;

    assert!(emitted);
    assert_eq!(
        cmd.text,
        "UPDATE users SET \"NAME\"=@NAME,\"AGE\"=@AGE WHERE \"ID\"=@ID"
    );
    assert_eq!(
        cmd.parameters,
        vec![
            ("NAME".to_string(), SqlParam::Text("a".to_string())),
            ("AGE".to_string(), SqlParam::Int(30)),
            ("ID".to_string(), SqlParam::Int(7)),
        ]
    );
    Ok(())
}

/// The exclude list removes columns from the SET clause.
#[test]
fn test_update_exclude() -> Result<()> {
    let mut cmd = SqlCommand::default();

    build_update_command(
        &mut cmd,
        &sample_row(),
        "users",
        &["Id"],
        None,
        Some(&["age"]),
        None,
        &DbSettings::postgres(),
    )?;

    assert_eq!(cmd.text, "UPDATE users SET \"NAME\"=@NAME WHERE \"ID\"=@ID");
    Ok(())
}

/// Tracked changes intersect with the include list.
#[test]
fn test_update_tracker_intersects_include() -> Result<()> {
    let mut cmd = SqlCommand::default();
    let tracker = FixedChanges(vec!["Name", "Age"]);

    build_update_command(
        &mut cmd,
        &sample_row(),
        "users",
        &["Id"],
        Some(&["age"]),
        None,
        Some(&tracker),
        &DbSettings::postgres(),
    )?;

    assert_eq!(cmd.text, "UPDATE users SET \"AGE\"=@AGE WHERE \"ID\"=@ID");
    Ok(())
}

/// An id field that is not a readable member is an error.
#[test]
fn test_update_unknown_id_field() {
    let mut cmd = SqlCommand::default();

    let result = build_update_command(
        &mut cmd,
        &sample_row(),
        "users",
        &["Missing"],
        None,
        None,
        None,
        &DbSettings::postgres(),
    );
    assert!(matches!(result, Err(Error::Sql(_))));
}

/// Composite keys render as AND-joined WHERE terms.
#[test]
fn test_update_composite_key() -> Result<()> {
    reflect_struct! {
        #[derive(Clone, Debug)]
        pub struct Membership {
            pub user_id: i64,
            pub group_id: i64,
            pub role: String,
        }
    }

    let mut cmd = SqlCommand::default();
    let emitted = build_update_command(
        &mut cmd,
        &Membership {
            user_id: 1,
            group_id: 2,
            role: "admin".to_string(),
        },
        "memberships",
        &["user_id", "group_id"],
        None,
        None,
        None,
        &DbSettings::postgres(),
    )?;

    assert!(emitted);
    assert_eq!(
        cmd.text,
        "UPDATE memberships SET \"ROLE\"=@ROLE WHERE \"USER_ID\"=@USER_ID AND \"GROUP_ID\"=@GROUP_ID"
    );
    Ok(())
}
