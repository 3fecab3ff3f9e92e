
use std::collections::BTreeSet;

use test_entities::{set_up, set_up_rejecting, set_up_with, tear_down};
use uuid::Uuid;

use crate::error::{ErrorKind, Result};
use crate::{EntityRef, Value};

fn ids(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn id_of(value: Option<Value>) -> Option<String> {
    value.and_then(|v| v.as_id().map(str::to_owned))
}

#[test]
fn primitives_round_trip() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    joe.set("age", 25)?;
    joe.set("ssn", "123-45-6789")?;
    joe.set("height", 1.82)?;
    joe.set("vegan", false)?;
    assert_eq!(joe.get("age")?, Some(Value::Integer(25)));
    assert_eq!(joe.get("ssn")?, Some(Value::from("123-45-6789")));
    assert_eq!(joe.get("height")?, Some(Value::Float(1.82)));
    assert_eq!(joe.get("vegan")?, Some(Value::Boolean(false)));
    assert_eq!(joe.get("income")?, None);
    joe.set("age", 26)?;
    assert_eq!(joe.get("age")?, Some(Value::Integer(26)));
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn field_and_type_errors() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    assert_eq!(joe.set("shoe_size", 42).unwrap_err().kind(), ErrorKind::InvalidField);
    assert_eq!(joe.get("shoe_size").unwrap_err().kind(), ErrorKind::InvalidField);
    assert_eq!(joe.set("age", "old").unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(joe.set("emails", "a@b.c").unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(joe.add("age", [1]).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(joe.add("emails", [3]).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(
        joe.set("owner", "sphinx").unwrap_err().kind(),
        ErrorKind::InvalidField
    );
    assert_eq!(
        db.create("dog", "rex").err().map(|e| e.kind()),
        Some(ErrorKind::UnregisteredEntity)
    );
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn existence_preconditions() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    db.create("person", "joe")?;
    assert_eq!(
        db.create("person", "joe").err().map(|e| e.kind()),
        Some(ErrorKind::AlreadyExists)
    );
    assert_eq!(
        db.instance("person", "bob").err().map(|e| e.kind()),
        Some(ErrorKind::NotFound)
    );
    // same id under another type is a different entity
    db.create("cat", "joe")?;
    assert!(db.exists("person", "joe")?);
    assert!(!db.exists("person", "bob")?);
    assert_eq!(db.ids("person")?, ids(&["joe"]));
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn one_to_many_owner_transfer() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let x = db.create("person", "x")?;
    let y = db.create("person", "y")?;
    let cat = db.create("cat", "a")?;
    cat.set("owner", &x)?;
    assert_eq!(x.related_ids("cats")?, ids(&["a"]));
    cat.set("owner", &y)?;
    assert_eq!(x.related_ids("cats")?, ids(&[]));
    assert_eq!(y.related_ids("cats")?, ids(&["a"]));
    assert_eq!(id_of(cat.get("owner")?), Some(String::from("y")));
    assert!(cat.clear("owner")?);
    assert_eq!(y.related_ids("cats")?, ids(&[]));
    assert!(!cat.clear("owner")?);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn adding_to_owner_set_steals_from_previous_owner() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    db.create("cat", "sphinx")?;
    joe.add("cats", ["sphinx"])?;
    bob.add("cats", ["sphinx"])?;
    let sphinx = db.instance("cat", "sphinx")?;
    assert_eq!(id_of(sphinx.get("owner")?), Some(String::from("bob")));
    assert_eq!(joe.related_ids("cats")?, ids(&[]));
    assert_eq!(bob.related_ids("cats")?, ids(&["sphinx"]));
    bob.remove("cats", [&sphinx])?;
    assert_eq!(sphinx.get("owner")?, None);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn many_to_many_symmetry() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let x = db.create("person", "x")?;
    let y = db.create("person", "y")?;
    let cat = db.create("cat", "a")?;
    cat.add("caretakers", [&x])?;
    cat.add("caretakers", [&y])?;
    assert_eq!(x.related_ids("cats_to_feed")?, ids(&["a"]));
    assert_eq!(y.related_ids("cats_to_feed")?, ids(&["a"]));
    assert_eq!(cat.related_ids("caretakers")?, ids(&["x", "y"]));
    cat.remove("caretakers", [&y])?;
    assert_eq!(y.related_ids("cats_to_feed")?, ids(&[]));
    assert_eq!(x.related_ids("cats_to_feed")?, ids(&["a"]));
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn self_relation_symmetry() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    joe.add("friends", [&bob])?;
    assert_eq!(bob.related_ids("friends")?, ids(&["joe"]));
    assert_eq!(joe.related_ids("friends")?, ids(&["bob"]));
    joe.remove("friends", [&bob])?;
    assert_eq!(bob.related_ids("friends")?, ids(&[]));
    assert_eq!(joe.related_ids("friends")?, ids(&[]));
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn self_one_to_one_keeps_pairs() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    let alice = db.create("person", "alice")?;
    joe.set("spouse", &bob)?;
    assert_eq!(id_of(bob.get("spouse")?), Some(String::from("joe")));
    alice.set("spouse", &bob)?;
    assert_eq!(id_of(bob.get("spouse")?), Some(String::from("alice")));
    assert_eq!(joe.get("spouse")?, None);
    bob.set("spouse", &joe)?;
    assert_eq!(alice.get("spouse")?, None);
    assert_eq!(id_of(joe.get("spouse")?), Some(String::from("bob")));
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn one_to_one_across_types() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    let sphinx = db.create("cat", "sphinx")?;
    let polly = db.create("cat", "polly")?;
    joe.set("cat_buddy", &sphinx)?;
    assert_eq!(id_of(sphinx.get("person_buddy")?), Some(String::from("joe")));
    bob.set("cat_buddy", &sphinx)?;
    assert_eq!(joe.get("cat_buddy")?, None);
    assert_eq!(id_of(sphinx.get("person_buddy")?), Some(String::from("bob")));
    bob.set("cat_buddy", &polly)?;
    assert_eq!(sphinx.get("person_buddy")?, None);
    assert_eq!(id_of(polly.get("person_buddy")?), Some(String::from("bob")));
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn cascading_delete_leaves_no_dangling_id() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let sphinx = db.create("cat", "sphinx")?;
    let polly = db.create("cat", "polly")?;
    joe.add("cats", [&sphinx])?;
    joe.add("cats", [&polly])?;
    joe.add("cats_to_feed", [&sphinx])?;
    joe.set("cat_buddy", &polly)?;
    joe.set("ssn", "123")?;
    joe.add("friends", ["joe"])?;
    polly.delete()?;
    assert_eq!(joe.related_ids("cats")?, ids(&["sphinx"]));
    assert_eq!(joe.get("cat_buddy")?, None);
    assert_eq!(id_of(sphinx.get("owner")?), Some(String::from("joe")));

    joe.delete()?;
    assert_eq!(sphinx.get("owner")?, None);
    assert_eq!(sphinx.related_ids("caretakers")?, ids(&[]));
    assert!(db.lookup("person", "ssn", "123")?.is_empty());
    assert!(!db.exists("person", "joe")?);
    let keys = db.store().physical_keys()?;
    assert!(keys.iter().all(|k| !k.contains("joe")), "{:?}", keys);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn deleting_everything_empties_the_store() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    let sphinx = db.create("cat", "sphinx")?;
    joe.add("friends", [&bob])?;
    joe.set("favorite_cat", &sphinx)?;
    bob.push("walk_order", [&sphinx])?;
    bob.add_scored("ranked_cats", [(&sphinx, 2.0)])?;
    joe.add("nicknames", ["jo"])?;
    sphinx.set("biochip", 77)?;
    sphinx.delete()?;
    joe.delete()?;
    bob.delete()?;
    assert!(db.store().is_empty(), "{:?}", db.store().physical_keys()?);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn ids_with_separators_do_not_collide() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let a = db.create("person", "a")?;
    let a_cats = db.create("person", "a:cats")?;
    let nobody = db.create("person", "")?;
    let bob = db.create("person", "bob")?;
    let sphinx = db.create("cat", "sphinx")?;
    a_cats.set("spouse", &bob)?;
    a_cats.add("nicknames", ["ac"])?;
    a.add("cats", [&sphinx])?;
    nobody.add("friends", [&a_cats, &a])?;

    a.delete()?;
    assert_eq!(id_of(bob.get("spouse")?), Some(String::from("a:cats")));
    assert_eq!(id_of(a_cats.get("spouse")?), Some(String::from("bob")));
    assert_eq!(a_cats.related_ids("friends")?, ids(&[""]));
    assert_eq!(nobody.related_ids("friends")?, ids(&["a:cats"]));
    assert_eq!(sphinx.get("owner")?, None);
    assert_eq!(db.lookup("person", "nicknames", "ac")?, vec![String::from("a:cats")]);

    a_cats.delete()?;
    assert_eq!(bob.get("spouse")?, None);
    assert_eq!(nobody.related_ids("friends")?, ids(&[]));
    assert!(db.lookup("person", "nicknames", "ac")?.is_empty());

    nobody.delete()?;
    bob.delete()?;
    sphinx.delete()?;
    assert!(db.store().is_empty(), "{:?}", db.store().physical_keys()?);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn adding_twice_links_once() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let sphinx = db.create("cat", "sphinx")?;
    assert_eq!(joe.add("cats_to_feed", [&sphinx, &sphinx])?, 1);
    assert_eq!(joe.add("cats_to_feed", [&sphinx])?, 0);
    assert_eq!(joe.members("cats_to_feed")?.len(), 1);
    assert_eq!(sphinx.related_ids("caretakers")?, ids(&["joe"]));
    assert_eq!(joe.remove("cats_to_feed", ["sphinx", "sphinx"])?, 1);
    assert_eq!(joe.remove("cats_to_feed", ["sphinx"])?, 0);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn references_must_exist_and_match_type() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    let sphinx = db.create("cat", "sphinx")?;
    assert_eq!(
        sphinx.set("owner", "nobody").unwrap_err().kind(),
        ErrorKind::DanglingReference
    );
    assert_eq!(sphinx.set("owner", &sphinx).unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(sphinx.set("owner", 3).unwrap_err().kind(), ErrorKind::TypeMismatch);
    sphinx.set("owner", EntityRef::new("person", "joe"))?;
    // a failed member rejects the whole call before any link is written
    let err = sphinx
        .add("caretakers", [Value::from(&bob), Value::from("ghost")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DanglingReference);
    assert_eq!(bob.related_ids("cats_to_feed")?, ids(&[]));
    assert_eq!(sphinx.related_ids("caretakers")?, ids(&[]));
    assert_eq!(joe.related_ids("cats")?, ids(&["sphinx"]));
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn second_delete_is_not_found() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let again = db.instance("person", "joe")?;
    joe.delete()?;
    assert_eq!(again.set("age", 3).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(again.get("age").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(again.delete().unwrap_err().kind(), ErrorKind::NotFound);
    // the id can be reused once deleted
    let joe = db.create("person", "joe")?;
    assert_eq!(joe.get("age")?, None);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn one_directional_reference_cleared_with_target() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let sphinx = db.create("cat", "sphinx")?;
    let polly = db.create("cat", "polly")?;
    joe.set("favorite_cat", &sphinx)?;
    joe.set("favorite_cat", &polly)?;
    sphinx.delete()?;
    assert_eq!(id_of(joe.get("favorite_cat")?), Some(String::from("polly")));
    polly.delete()?;
    assert_eq!(joe.get("favorite_cat")?, None);
    // the back-reference is not a visible field
    assert!(joe.entity_type().field("favorite_cat").is_some());
    let cat = db.schema().get("cat")?;
    assert!(cat.fields().all(|f| !f.name.starts_with('~')));
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn injective_lookup_follows_value() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    joe.set("ssn", "111")?;
    assert_eq!(db.lookup_one("person", "ssn", "111")?.map(|e| e.id().to_owned()), Some(String::from("joe")));
    joe.set("ssn", "222")?;
    assert!(db.lookup("person", "ssn", "111")?.is_empty());
    assert_eq!(db.lookup("person", "ssn", "222")?, vec![String::from("joe")]);

    // reassigned by default: bob takes the entry, joe keeps the value
    bob.set("ssn", "222")?;
    assert_eq!(db.lookup("person", "ssn", "222")?, vec![String::from("bob")]);
    assert_eq!(joe.get("ssn")?, Some(Value::from("222")));
    // joe moving on must not clobber bob's entry
    joe.set("ssn", "333")?;
    assert_eq!(db.lookup("person", "ssn", "222")?, vec![String::from("bob")]);
    assert_eq!(db.lookup("person", "ssn", "333")?, vec![String::from("joe")]);
    assert_eq!(
        db.lookup("person", "age", 3).unwrap_err().kind(),
        ErrorKind::InvalidField
    );
    assert_eq!(
        db.lookup("person", "ssn", 3).unwrap_err().kind(),
        ErrorKind::TypeMismatch
    );
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn injective_lookup_reject_policy() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up_rejecting(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    let sphinx = db.create("cat", "sphinx")?;
    joe.set("ssn", "111")?;
    sphinx.set("owner", &bob)?;
    assert_eq!(bob.set("ssn", "111").unwrap_err().kind(), ErrorKind::LookupConflict);
    assert_eq!(bob.get("ssn")?, None);
    joe.add("emails", ["joe@example.com"])?;
    assert_eq!(
        bob.add("emails", ["bob@example.com", "joe@example.com"]).unwrap_err().kind(),
        ErrorKind::LookupConflict
    );
    assert!(bob.members("emails")?.is_empty());
    assert!(db.lookup("person", "emails", "bob@example.com")?.is_empty());
    // rewriting one's own value is not a conflict
    joe.set("ssn", "111")?;
    assert_eq!(db.lookup("person", "ssn", "111")?, vec![String::from("joe")]);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn set_and_non_injective_lookups() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    joe.add("emails", ["joe@example.com", "jo@example.com"])?;
    joe.add("nicknames", ["jj"])?;
    bob.add("nicknames", ["jj", "bobby"])?;
    assert_eq!(db.lookup("person", "emails", "jo@example.com")?, vec![String::from("joe")]);
    assert_eq!(
        db.lookup("person", "nicknames", "jj")?,
        vec![String::from("bob"), String::from("joe")]
    );
    joe.remove("emails", ["jo@example.com"])?;
    assert!(db.lookup("person", "emails", "jo@example.com")?.is_empty());
    joe.delete()?;
    assert!(db.lookup("person", "emails", "joe@example.com")?.is_empty());
    assert_eq!(db.lookup("person", "nicknames", "jj")?, vec![String::from("bob")]);
    assert!(db.lookup_one("person", "emails", "joe@example.com")?.is_none());
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn increment_updates_lookups() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let sphinx = db.create("cat", "sphinx")?;
    assert_eq!(sphinx.increment("biochip", 5)?, 5);
    assert_eq!(sphinx.increment("biochip", -2)?, 3);
    assert_eq!(db.lookup("cat", "biochip", 3)?, vec![String::from("sphinx")]);
    assert!(db.lookup("cat", "biochip", 5)?.is_empty());
    assert_eq!(
        sphinx.increment("eye_color", 1).unwrap_err().kind(),
        ErrorKind::TypeMismatch
    );
    assert_eq!(sphinx.increment("biochip", i64::MAX).unwrap_err().kind(), ErrorKind::Overflow);
    assert_eq!(sphinx.get("biochip")?, Some(Value::Integer(3)));
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn list_relation_keeps_order_and_inverse() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    let sphinx = db.create("cat", "sphinx")?;
    let polly = db.create("cat", "polly")?;
    joe.push("walk_order", [&polly, &sphinx, &polly])?;
    let order: Vec<_> = joe.items("walk_order")?.into_iter().filter_map(|v| v.as_id().map(str::to_owned)).collect();
    assert_eq!(order, vec!["polly", "sphinx", "polly"]);
    assert_eq!(id_of(polly.get("walker")?), Some(String::from("joe")));
    bob.push("walk_order", [&polly])?;
    assert_eq!(joe.items("walk_order")?, vec![Value::Ref(sphinx.reference())]);
    assert_eq!(id_of(polly.get("walker")?), Some(String::from("bob")));
    polly.set("walker", &joe)?;
    assert!(bob.items("walk_order")?.is_empty());
    assert_eq!(joe.pull("walk_order", [&sphinx, &polly])?, 2);
    assert_eq!(sphinx.get("walker")?, None);
    assert_eq!(polly.get("walker")?, None);

    joe.push("tasks", ["feed", "walk", "feed"])?;
    assert_eq!(joe.items("tasks")?.len(), 3);
    assert_eq!(joe.pull("tasks", ["feed"])?, 2);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn sorted_relation_orders_by_score() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let sphinx = db.create("cat", "sphinx")?;
    let polly = db.create("cat", "polly")?;
    assert_eq!(joe.add_scored("ranked_cats", [(&sphinx, 2.0), (&polly, 1.0)])?, 2);
    assert_eq!(joe.add_scored("ranked_cats", [(&polly, 3.0)])?, 0);
    let ranking: Vec<_> = joe
        .scored("ranked_cats")?
        .into_iter()
        .map(|(v, s)| (v.as_id().unwrap_or_default().to_owned(), s))
        .collect();
    assert_eq!(
        ranking,
        vec![(String::from("sphinx"), 2.0), (String::from("polly"), 3.0)]
    );
    assert_eq!(id_of(sphinx.get("ranked_by")?), Some(String::from("joe")));
    polly.delete()?;
    assert_eq!(joe.scored("ranked_cats")?.len(), 1);
    joe.remove_scored("ranked_cats", [&sphinx])?;
    assert_eq!(sphinx.get("ranked_by")?, None);
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn export_snapshot() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up(&name)?;
    let joe = db.create("person", "joe")?;
    let sphinx = db.create("cat", "sphinx")?;
    joe.set("age", 30)?;
    joe.add("cats", [&sphinx])?;
    let snapshot = joe.export()?;
    assert_eq!(snapshot["id"], "joe");
    assert_eq!(snapshot["age"], 30);
    assert_eq!(snapshot["cats"], serde_json::json!(["sphinx"]));
    assert!(snapshot.get("income").is_none());
    assert_eq!(sphinx.export()?["owner"], "joe");
    tear_down(db, &name)?;
    Ok(())
}

#[test]
fn best_effort_mode_applies_the_same_cascade() -> Result<()> {
    let name = Uuid::new_v4().to_string();
    let db = set_up_with(&name, |config| config.atomic_mutations = false)?;
    let joe = db.create("person", "joe")?;
    let bob = db.create("person", "bob")?;
    let sphinx = db.create("cat", "sphinx")?;
    joe.add("cats", [&sphinx])?;
    joe.add("friends", [&bob])?;
    joe.delete()?;
    assert_eq!(sphinx.get("owner")?, None);
    assert!(bob.members("friends")?.is_empty());
    tear_down(db, &name)?;
    Ok(())
}
