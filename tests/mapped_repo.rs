use repolite::{
    Attributes, ErrorBag, Filter, MappedStrategy, Model, Op, Page, Query, RepoError, RepoResult,
    Repository, Validator, Value,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// In-memory backing store standing in for the mapped entity's engine.
#[derive(Default)]
struct Store {
    rows: BTreeMap<i64, Attributes>,
    next_id: i64,
    saves: usize,
    pushes: usize,
}

type SharedStore = Rc<RefCell<Store>>;

#[derive(Clone)]
struct Contact {
    store: SharedStore,
    attributes: Attributes,
    exists: bool,
}

impl Contact {
    fn prototype(store: &SharedStore) -> Self {
        Self {
            store: store.clone(),
            attributes: Attributes::new(),
            exists: false,
        }
    }

    fn id(&self) -> Option<i64> {
        match self.attributes.get("id") {
            Some(Value::Integer(id)) => Some(*id),
            _ => None,
        }
    }

    fn write_row(&mut self) -> RepoResult<bool> {
        let mut store = self.store.borrow_mut();
        let id = match self.id() {
            Some(id) => id,
            None => {
                store.next_id += 1;
                let id = store.next_id;
                self.attributes.set("id", id);
                id
            }
        };
        store.rows.insert(id, self.attributes.clone());
        self.exists = true;
        Ok(true)
    }
}

impl Model for Contact {
    type Query = ContactQuery;

    fn new_instance(&self, attributes: Attributes) -> Self {
        Self {
            store: self.store.clone(),
            attributes,
            exists: false,
        }
    }

    fn new_query(&self) -> ContactQuery {
        ContactQuery {
            prototype: self.clone(),
            filters: Vec::new(),
        }
    }

    fn table(&self) -> String {
        "contacts".to_string()
    }

    fn qualified_key_name(&self) -> String {
        "contacts.id".to_string()
    }

    fn fill(&mut self, attributes: &Attributes) {
        self.attributes.merge(attributes);
    }

    fn attributes(&self) -> Attributes {
        self.attributes.clone()
    }

    fn save(&mut self) -> RepoResult<bool> {
        self.store.borrow_mut().saves += 1;
        self.write_row()
    }

    fn push(&mut self) -> RepoResult<bool> {
        self.store.borrow_mut().pushes += 1;
        self.write_row()
    }

    fn delete(&mut self) -> RepoResult<bool> {
        let Some(id) = self.id() else {
            return Ok(false);
        };
        Ok(self.store.borrow_mut().rows.remove(&id).is_some())
    }

    fn key(&self) -> Option<Value> {
        self.attributes.get("id").cloned()
    }

    fn exists(&self) -> bool {
        self.exists
    }
}

struct ContactQuery {
    prototype: Contact,
    filters: Vec<Filter>,
}

impl ContactQuery {
    fn matching_ids(&self) -> Vec<i64> {
        let store = self.prototype.store.borrow();
        store
            .rows
            .iter()
            .filter(|(id, attributes)| {
                self.filters
                    .iter()
                    .all(|filter| filter_matches(filter, **id, attributes))
            })
            .map(|(id, _)| *id)
            .collect()
    }
}

fn filter_matches(filter: &Filter, id: i64, attributes: &Attributes) -> bool {
    let field = filter
        .column
        .rsplit('.')
        .next()
        .unwrap_or(filter.column.as_str());
    let actual = if field == "id" {
        Some(Value::Integer(id))
    } else {
        attributes.get(field).cloned()
    };
    match filter.op {
        Op::Eq => actual.as_ref() == Some(&filter.value),
        _ => false,
    }
}

impl Query for ContactQuery {
    type Record = Contact;

    fn filter(&mut self, column: &str, op: Op, value: Value) {
        self.filters.push(Filter {
            column: column.to_string(),
            op,
            value,
        });
    }

    fn insert_get_id(&mut self, attributes: &Attributes) -> RepoResult<Option<Value>> {
        let mut contact = self.prototype.new_instance(attributes.clone());
        contact.write_row()?;
        Ok(contact.key())
    }

    fn update(&mut self, attributes: &Attributes) -> RepoResult<u64> {
        let ids = self.matching_ids();
        let mut store = self.prototype.store.borrow_mut();
        for id in &ids {
            if let Some(row) = store.rows.get_mut(id) {
                row.merge(attributes);
            }
        }
        Ok(ids.len() as u64)
    }

    fn delete(&mut self) -> RepoResult<u64> {
        let ids = self.matching_ids();
        let mut store = self.prototype.store.borrow_mut();
        for id in &ids {
            store.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }

    fn get(&mut self) -> RepoResult<Vec<Contact>> {
        Ok(self
            .matching_ids()
            .into_iter()
            .map(|id| {
                let attributes = self
                    .prototype
                    .store
                    .borrow()
                    .rows
                    .get(&id)
                    .cloned()
                    .unwrap_or_default();
                Contact {
                    store: self.prototype.store.clone(),
                    attributes,
                    exists: true,
                }
            })
            .collect())
    }

    fn first(&mut self) -> RepoResult<Option<Contact>> {
        Ok(self.get()?.into_iter().next())
    }

    fn paginate(&mut self, page: u32, per_page: u32) -> RepoResult<Page<Contact>> {
        let all = self.get()?;
        let total = all.len() as u64;
        let page = page.max(1);
        let start = ((page - 1) as usize) * per_page as usize;
        let items = all.into_iter().skip(start).take(per_page as usize).collect();
        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }
}

struct RejectingValidator;

impl Validator for RejectingValidator {
    fn valid_create(&mut self, _attributes: &Attributes) -> bool {
        false
    }

    fn valid_update(&mut self, _attributes: &Attributes) -> bool {
        false
    }

    fn replace(&mut self, _placeholder: &str, _value: Value) {}

    fn errors(&self) -> ErrorBag {
        let mut bag = ErrorBag::new();
        bag.add("name", "is invalid");
        bag
    }
}

fn contact_repo(store: &SharedStore) -> Repository<MappedStrategy<Contact>> {
    Repository::new(MappedStrategy::new(Contact::prototype(store)))
}

fn name_attrs(name: &str) -> Attributes {
    [("name", Value::Text(name.to_string()))].into_iter().collect()
}

#[test]
fn update_on_unpersisted_model_is_a_precondition_fault() {
    let store = SharedStore::default();
    let mut repo = contact_repo(&store);

    // Even a key attribute does not make an unpersisted model updatable.
    let mut draft = Contact::prototype(&store).new_instance(name_attrs("bob"));
    draft.attributes.set("id", 7_i64);

    let err = repo
        .update(&mut draft, name_attrs("robert"))
        .expect_err("unpersisted update must fault");
    assert!(matches!(err, RepoError::Precondition(_)));
    assert_eq!(store.borrow().saves, 0, "no save may reach the store");
}

#[test]
fn create_assigns_key_and_marks_the_model_persisted() {
    let store = SharedStore::default();
    let mut repo = contact_repo(&store);

    let contact = repo
        .create(name_attrs("bob"))
        .expect("create should not fault")
        .expect("create should succeed");

    assert_eq!(contact.key(), Some(Value::Integer(1)));
    assert!(contact.exists());
    assert_eq!(store.borrow().rows.len(), 1);
    assert_eq!(store.borrow().saves, 1);
}

#[test]
fn create_and_update_funnel_through_the_same_save_step() {
    let store = SharedStore::default();
    let mut repo = contact_repo(&store);

    let mut contact = repo
        .create(name_attrs("bob"))
        .expect("create should not fault")
        .expect("create should succeed");
    assert_eq!(store.borrow().saves, 1);

    let updated = repo
        .update(&mut contact, name_attrs("robert"))
        .expect("update should not fault");
    assert!(updated);
    assert_eq!(store.borrow().saves, 2);
    assert_eq!(store.borrow().pushes, 0);

    let row = store.borrow().rows.get(&1).cloned().expect("row should exist");
    assert_eq!(row.get("name"), Some(&Value::Text("robert".to_string())));
}

#[test]
fn deep_strategy_cascades_through_push() {
    let store = SharedStore::default();
    let mut repo = Repository::new(MappedStrategy::deep(Contact::prototype(&store)));

    repo.create(name_attrs("bob"))
        .expect("create should not fault")
        .expect("create should succeed");

    assert_eq!(store.borrow().pushes, 1);
    assert_eq!(store.borrow().saves, 0);
}

#[test]
fn delete_reports_false_when_the_store_removes_nothing() {
    let store = SharedStore::default();
    let mut repo = contact_repo(&store);

    let mut ghost = Contact::prototype(&store).new_instance(Attributes::new());
    ghost.attributes.set("id", 99_i64);

    let deleted = repo.delete(&mut ghost).expect("delete should not fault");
    assert!(!deleted);
}

#[test]
fn get_by_key_returns_a_persisted_instance() {
    let store = SharedStore::default();
    let mut repo = contact_repo(&store);
    repo.create(name_attrs("bob"))
        .expect("create should not fault")
        .expect("create should succeed");

    let loaded = repo
        .get_by_key(Value::Integer(1))
        .expect("fetch should not fault")
        .expect("contact should be found");
    assert!(loaded.exists());
    assert_eq!(
        loaded.attributes.get("name"),
        Some(&Value::Text("bob".to_string()))
    );

    let missing = repo
        .get_by_key(Value::Integer(2))
        .expect("fetch should not fault");
    assert!(missing.is_none());
}

#[test]
fn get_all_and_paginate_map_store_rows() {
    let store = SharedStore::default();
    let mut repo = contact_repo(&store);
    for name in ["ada", "bob", "cleo"] {
        repo.create(name_attrs(name))
            .expect("create should not fault")
            .expect("create should succeed");
    }

    let all = repo.get_all().expect("fetch should not fault");
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(Contact::exists));

    let page = repo.paginate(2, 2).expect("paginate should not fault");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total, 3);
    assert_eq!(page.last_page(), 2);
}

#[test]
fn persist_dispatches_on_key_state() {
    let store = SharedStore::default();
    let mut repo = contact_repo(&store);

    let mut contact = Contact::prototype(&store).new_instance(name_attrs("bob"));
    assert!(repo.persist(&mut contact).expect("persist should not fault"));
    assert_eq!(contact.key(), Some(Value::Integer(1)));
    assert!(contact.exists());
    assert_eq!(store.borrow().saves, 1);

    contact.attributes.set("name", "robert".to_string());
    assert!(repo.persist(&mut contact).expect("persist should not fault"));
    assert_eq!(store.borrow().saves, 2);
    assert_eq!(store.borrow().rows.len(), 1, "second persist must update");
}

#[test]
fn rejected_update_is_recoverable_and_never_saves() {
    let store = SharedStore::default();
    let strategy = MappedStrategy::new(Contact::prototype(&store));
    let mut repo = Repository::with_validator(strategy, Box::new(RejectingValidator));

    let mut contact = Contact::prototype(&store).new_instance(name_attrs("bob"));
    contact.write_row().expect("seed row should write");
    let saves_before = store.borrow().saves;

    let updated = repo
        .update(&mut contact, name_attrs("robert"))
        .expect("validation failure must not fault");
    assert!(!updated);
    assert_eq!(store.borrow().saves, saves_before);
    assert!(!repo.last_errors().expect("errors should be captured").is_empty());
}
