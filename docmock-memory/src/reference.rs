//! Reference nodes: positions in the mock document tree that double as query builders.
//!
//! A [`Reference`] is a cheap handle to a node. Every node of a tree shares one
//! [`FlushQueue`] and one auto-flush setting; reads are deferred onto that
//! queue and only run when it is flushed, either explicitly or automatically
//! through [`Reference::auto_flush`].
//!
//! Query builders (`filter`, `order_by`, `limit`, `start_after`) never change
//! the node they are called on. Each returns a new node carrying a copy of the
//! data and query state.
//!
//! Handles own the tree's queue; nodes only point back at it. Once every handle
//! of a tree is gone the queue is dropped with its pending operations, and
//! their results resolve to [`MockError::Dropped`].

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
    fmt,
    rc::{Rc, Weak},
    time::Duration,
};

use bson::{Bson, Document};
use serde_json::Value;
use tracing::{debug, warn};

use docmock_core::{
    document::{derive_id, json_to_document},
    error::{MockError, MockResult},
    normalize::normalize_data,
    query::{Sort, SortDirection, StartAfter, StartAfterArg, WhereOp},
    scheduler::{FlushDelay, FlushQueue},
};

use crate::{
    evaluator::DocumentEvaluator,
    pending::{DocumentStream, PendingResult},
    pipeline::QueryPlan,
    snapshot::QuerySnapshot,
};

/// Metadata recorded for every deferred operation.
#[derive(Debug, Clone)]
pub struct Operation {
    /// The node the operation was called on.
    pub reference: Reference,
    /// The operation type, such as `"get"`.
    pub method: String,
    /// The arguments the operation was called with.
    pub args: Vec<Bson>,
}

/// Queue entry behind an [`Operation`]. Holds its node without the tree.
#[derive(Clone)]
struct Deferred {
    node: Rc<Node>,
    method: String,
    args: Vec<Bson>,
}

/// State shared by every node of one tree.
struct Tree {
    queue: FlushQueue<Deferred>,
    flush_delay: Cell<FlushDelay>,
}

impl Tree {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            queue: FlushQueue::new(),
            flush_delay: Cell::new(FlushDelay::Disabled),
        })
    }
}

struct Node {
    path: String,
    id: Option<String>,
    data: RefCell<Document>,
    parent: Option<Rc<Node>>,
    children: RefCell<BTreeMap<String, Weak<Node>>>,
    errs: RefCell<HashMap<String, MockError>>,
    sorts: Vec<Sort>,
    limited: usize,
    cursor: Option<Rc<StartAfter>>,
    /// The unscoped node a query node was built from.
    collection: Option<Rc<Node>>,
    tree: Weak<Tree>,
}

/// A handle to one node of a mock document tree.
///
/// Cloning the handle does not copy the node; use [`Reference::clone_node`]
/// for an independent copy.
///
/// # Example
///
/// ```ignore
/// use bson::doc;
/// use docmock_memory::Reference;
///
/// let items = Reference::root("items", doc! {
///     "a": { "n": 1 },
///     "b": { "n": 2 },
///     "c": { "n": 3 },
/// });
///
/// let mut pending = items.order_by_with("n", SortDirection::Desc).limit(2).get();
/// items.flush(None);
///
/// let snapshot = pending.await?;
/// assert_eq!(snapshot.keys(), vec!["c", "b"]);
/// ```
#[derive(Clone)]
pub struct Reference {
    node: Rc<Node>,
    tree: Rc<Tree>,
}

impl Reference {
    /// Creates a node at `path` holding `data`.
    ///
    /// A node with a parent joins the parent's tree, sharing its queue and
    /// auto-flush setting; its id is `name` when given. Any other node starts a
    /// new tree and its id is derived from the last path segment.
    pub fn new(
        path: impl Into<String>,
        data: Document,
        parent: Option<&Reference>,
        name: Option<&str>,
    ) -> Self {
        let path = path.into();
        let (id, tree) = match parent {
            Some(parent) => (
                name.map(str::to_string).or_else(|| derive_id(&path)),
                parent.tree.clone(),
            ),
            None => (derive_id(&path), Tree::new()),
        };

        Self {
            node: Rc::new(Node {
                path,
                id,
                data: RefCell::new(normalize_data(data)),
                parent: parent.map(|parent| parent.node.clone()),
                children: RefCell::new(BTreeMap::new()),
                errs: RefCell::new(HashMap::new()),
                sorts: Vec::new(),
                limited: 0,
                cursor: None,
                collection: None,
                tree: Rc::downgrade(&tree),
            }),
            tree,
        }
    }

    /// Creates a root node with its own queue.
    pub fn root(path: impl Into<String>, data: Document) -> Self {
        Self::new(path, data, None, None)
    }

    /// Creates a builder for configuring a root node.
    pub fn builder(path: impl Into<String>) -> ReferenceBuilder {
        ReferenceBuilder::new(path)
    }

    /// Wraps a node of this handle's tree.
    fn with_node(&self, node: Rc<Node>) -> Reference {
        Reference { node, tree: self.tree.clone() }
    }

    /// Wraps a node whose tree may already be gone.
    fn attach(node: Rc<Node>) -> Option<Reference> {
        let tree = node.tree.upgrade()?;
        Some(Reference { node, tree })
    }

    pub fn path(&self) -> &str {
        &self.node.path
    }

    /// Returns the node's id within its parent, if one could be determined.
    pub fn id(&self) -> Option<&str> {
        self.node.id.as_deref()
    }

    pub fn parent(&self) -> Option<Reference> {
        self.node.parent.clone().map(|node| self.with_node(node))
    }

    /// Returns a copy of the node's data.
    pub fn data(&self) -> Document {
        self.node.data.borrow().clone()
    }

    /// Replaces the node's data with a normalized copy of `data`.
    pub fn set_data(&self, data: Document) -> &Self {
        *self.node.data.borrow_mut() = normalize_data(data);
        self
    }

    /// Returns the sort field paths, in the order they were added.
    pub fn ordered_properties(&self) -> Vec<&str> {
        self.node
            .sorts
            .iter()
            .map(|sort| sort.field.as_str())
            .collect()
    }

    /// Returns the sort directions, parallel to [`Reference::ordered_properties`].
    pub fn ordered_directions(&self) -> Vec<SortDirection> {
        self.node
            .sorts
            .iter()
            .map(|sort| sort.direction)
            .collect()
    }

    /// Returns the result limit; zero means unlimited.
    pub fn limited(&self) -> usize {
        self.node.limited
    }

    pub fn flush_delay(&self) -> FlushDelay {
        self.tree.flush_delay.get()
    }

    /// Returns true when both handles point at the same node.
    pub fn ptr_eq(&self, other: &Reference) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub(crate) fn child_path(&self, name: &str) -> String {
        if self.node.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.node.path, name)
        }
    }

    /// Returns the child node named `name`, creating it if needed.
    ///
    /// A new child starts with a copy of the parent's entry `name` when that
    /// entry is a document of documents, and with no data otherwise. Children
    /// are tracked weakly: a child nobody holds is recreated on the next call.
    pub fn child(&self, name: &str) -> Reference {
        if let Some(existing) = self
            .node
            .children
            .borrow()
            .get(name)
            .and_then(Weak::upgrade)
        {
            return self.with_node(existing);
        }

        let data = match self.node.data.borrow().get_document(name) {
            Ok(entry) if entry.values().all(|value| value.as_document().is_some()) => entry.clone(),
            _ => Document::new(),
        };
        let child = Reference::new(self.child_path(name), data, Some(self), Some(name));

        self.node
            .children
            .borrow_mut()
            .insert(name.to_string(), Rc::downgrade(&child.node));

        child
    }

    /// Returns the live children of this node.
    pub fn children(&self) -> Vec<Reference> {
        let mut children = self.node.children.borrow_mut();
        children.retain(|_, child| child.strong_count() > 0);
        children
            .values()
            .filter_map(Weak::upgrade)
            .map(|node| self.with_node(node))
            .collect()
    }

    /// Creates an independent node over the same position, carrying a copy of
    /// the data and all query state. The start-after cursor is shared.
    pub fn clone_node(&self) -> Reference {
        self.derive(
            self.data(),
            self.node.sorts.clone(),
            self.node.limited,
            self.node.cursor.clone(),
            self.node.collection.clone(),
        )
    }

    /// Derives a query node: same position and tree, its own query state.
    fn derive_query(
        &self,
        data: Document,
        sorts: Vec<Sort>,
        limited: usize,
        cursor: Option<Rc<StartAfter>>,
    ) -> Reference {
        let collection = self
            .node
            .collection
            .clone()
            .unwrap_or_else(|| self.node.clone());

        self.derive(data, sorts, limited, cursor, Some(collection))
    }

    fn derive(
        &self,
        data: Document,
        sorts: Vec<Sort>,
        limited: usize,
        cursor: Option<Rc<StartAfter>>,
        collection: Option<Rc<Node>>,
    ) -> Reference {
        self.with_node(Rc::new(Node {
            path: self.node.path.clone(),
            id: self.node.id.clone(),
            data: RefCell::new(data),
            parent: self.node.parent.clone(),
            children: RefCell::new(BTreeMap::new()),
            errs: RefCell::new(HashMap::new()),
            sorts,
            limited,
            cursor,
            collection,
            tree: self.node.tree.clone(),
        }))
    }

    /// Registers an error that the next `method` operation on this node fails with.
    pub fn fail_next(&self, method: &str, err: MockError) -> &Self {
        self.node
            .errs
            .borrow_mut()
            .insert(method.to_string(), err);
        self
    }

    /// Takes the injected error for `method`, if any. Each error fires once.
    fn next_err(&self, method: &str) -> Option<MockError> {
        self.node.errs.borrow_mut().remove(method)
    }

    /// Runs every pending operation of the tree now, or after `delay` on the
    /// queue's virtual clock.
    pub fn flush(&self, delay: impl Into<Option<Duration>>) -> &Self {
        self.tree.queue.flush(delay.into());
        self
    }

    /// Advances the tree's virtual clock, firing delayed flushes that became due.
    pub fn advance(&self, by: Duration) -> &Self {
        self.tree.queue.advance(by);
        self
    }

    /// Sets the auto-flush behavior of every node in this node's tree.
    ///
    /// Pass `true` to flush every deferred operation immediately, `false` to
    /// wait for explicit flushes, or a [`Duration`] to flush after a delay.
    pub fn auto_flush(&self, delay: impl Into<FlushDelay>) -> &Self {
        self.set_flush_delay(delay.into());
        self
    }

    /// Stores `delay` as the tree's auto-flush setting. Returns false, and does
    /// nothing, when the tree already holds `delay`.
    pub(crate) fn set_flush_delay(&self, delay: FlushDelay) -> bool {
        if self.tree.flush_delay.get() == delay {
            return false;
        }

        self.tree.flush_delay.set(delay);
        debug!(path = %self.node.path, ?delay, "auto flush changed");
        true
    }

    /// Returns the operations waiting on the tree's queue, oldest first.
    pub fn flush_queue(&self) -> Vec<Operation> {
        self.tree
            .queue
            .events()
            .into_iter()
            .map(|deferred| Operation {
                reference: self.with_node(deferred.node),
                method: deferred.method,
                args: deferred.args,
            })
            .collect()
    }

    fn defer(&self, method: &str, args: Vec<Bson>, callback: impl FnOnce() + 'static) {
        self.tree.queue.push(
            callback,
            Deferred {
                node: self.node.clone(),
                method: method.to_string(),
                args,
            },
        );
        debug!(
            path = %self.node.path,
            method,
            pending = self.tree.queue.len(),
            "deferred operation"
        );

        if let Some(delay) = self.tree.flush_delay.get().flush_delay() {
            self.tree.queue.flush(delay);
        }
    }

    /// Returns a node holding only the documents whose `field` satisfies `op`
    /// against `value`.
    ///
    /// Supported operators are `"=="` and `"array-contains"`. Any other
    /// operator logs a warning and keeps the full data set.
    pub fn filter(&self, field: &str, op: impl Into<WhereOp>, value: impl Into<Bson>) -> Reference {
        let op = op.into();
        let value = value.into();

        let data = match &op {
            WhereOp::Unsupported(operator) => {
                warn!(
                    path = %self.node.path,
                    field,
                    operator = %operator,
                    "unsupported where() operator, returning the entire data set"
                );
                self.data()
            }
            _ => DocumentEvaluator::filter_documents(&self.node.data.borrow(), field, &op, &value),
        };

        self.derive_query(data, self.node.sorts.clone(), self.node.limited, self.node.cursor.clone())
    }

    /// Returns a node that also sorts ascending by `field`.
    pub fn order_by(&self, field: &str) -> Reference {
        self.order_by_with(field, SortDirection::Asc)
    }

    /// Returns a node that also sorts by `field` in `direction`. Earlier sort
    /// keys take precedence.
    pub fn order_by_with(&self, field: &str, direction: SortDirection) -> Reference {
        let mut sorts = self.node.sorts.clone();
        sorts.push(Sort { field: field.to_string(), direction });

        self.derive_query(self.data(), sorts, self.node.limited, self.node.cursor.clone())
    }

    /// Returns a node that yields at most `limit` documents. Zero removes the limit.
    pub fn limit(&self, limit: usize) -> Reference {
        self.derive_query(self.data(), self.node.sorts.clone(), limit, self.node.cursor.clone())
    }

    /// Returns a node whose results start strictly after the given document.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::InvalidQuery`] if no sort key is configured.
    /// Raw field values are not modeled: they log a warning and return this
    /// same node.
    pub fn start_after(&self, at: impl Into<StartAfterArg>) -> MockResult<Reference> {
        if self.node.sorts.is_empty() {
            return Err(MockError::InvalidQuery(format!(
                "start_after() on {} requires at least one order_by() clause",
                self.node.path
            )));
        }

        match at.into() {
            StartAfterArg::Snapshot(snapshot) => Ok(self.derive_query(
                self.data(),
                self.node.sorts.clone(),
                self.node.limited,
                Some(Rc::new(StartAfter::new(snapshot.id()))),
            )),
            StartAfterArg::FieldValues(values) => {
                warn!(
                    path = %self.node.path,
                    values = values.len(),
                    "start_after() only supports document snapshots, ignoring cursor"
                );
                Ok(self.clone())
            }
        }
    }

    /// Reads the query results.
    ///
    /// The read is deferred: the returned future resolves once the tree's queue
    /// is flushed. An error registered with `fail_next("get", ..)` is taken now
    /// and rejects this read instead of running the query.
    pub fn get(&self) -> PendingResult<QuerySnapshot> {
        let (resolver, pending) = PendingResult::channel("get");
        self.get_with(move |result| resolver.resolve(result));
        pending
    }

    /// Reads the query results as a stream of document snapshots.
    ///
    /// A failed read yields one `Err` item before the stream ends.
    pub fn stream(&self) -> DocumentStream {
        let (sender, stream) = DocumentStream::channel();
        self.get_with(move |result| match result {
            Ok(snapshot) => {
                for doc in snapshot {
                    if sender.unbounded_send(Ok(doc)).is_err() {
                        break;
                    }
                }
            }
            Err(err) => {
                let _ = sender.unbounded_send(Err(err));
            }
        });
        stream
    }

    fn get_with(&self, complete: impl FnOnce(MockResult<QuerySnapshot>) + 'static) {
        let err = self.next_err("get");
        let node = self.node.clone();

        self.defer("get", Vec::new(), move || {
            let result = match err {
                Some(err) => Err(err),
                None => match Reference::attach(node) {
                    Some(reference) => Ok(reference.run_query()),
                    None => return,
                },
            };
            complete(result);
        });
    }

    fn run_query(&self) -> QuerySnapshot {
        let collection = self.collection_ref();
        let data = self.node.data.borrow();
        if data.is_empty() {
            return QuerySnapshot::empty(collection);
        }

        let plan = QueryPlan {
            sorts: &self.node.sorts,
            cursor: self.node.cursor.as_deref(),
            limit: self.node.limited,
        };

        QuerySnapshot::new(collection, plan.execute(&data))
    }

    /// The collection a result belongs to: the node a query was built from, or
    /// this node when it carries no query.
    fn collection_ref(&self) -> Reference {
        match &self.node.collection {
            Some(collection) => self.with_node(collection.clone()),
            None => self.clone(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.node.path)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("path", &self.node.path)
            .field("id", &self.node.id)
            .field("sorts", &self.node.sorts)
            .field("limited", &self.node.limited)
            .field("cursor", &self.node.cursor)
            .field("flush_delay", &self.tree.flush_delay.get())
            .finish()
    }
}

/// Builder for root [`Reference`] nodes.
///
/// # Example
///
/// ```ignore
/// use docmock_memory::Reference;
/// use serde_json::json;
///
/// let users = Reference::builder("users")
///     .json(json!({ "alice": { "age": 30 } }))
///     .auto_flush(true)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct ReferenceBuilder {
    path: String,
    data: Document,
    json: Option<Value>,
    auto_flush: FlushDelay,
}

impl ReferenceBuilder {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Sets the initial data mapping of document key to document.
    pub fn data(mut self, data: Document) -> Self {
        self.data = data;
        self.json = None;
        self
    }

    /// Sets the initial data from a JSON object of document key to document.
    pub fn json(mut self, value: Value) -> Self {
        self.json = Some(value);
        self
    }

    /// Sets the initial auto-flush behavior.
    pub fn auto_flush(mut self, delay: impl Into<FlushDelay>) -> Self {
        self.auto_flush = delay.into();
        self
    }

    /// Builds the root node.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Serialization`] if JSON data is not an object.
    pub fn build(self) -> MockResult<Reference> {
        let data = match &self.json {
            Some(value) => json_to_document(value)?,
            None => self.data,
        };

        let reference = Reference::root(self.path, data);
        reference.auto_flush(self.auto_flush);

        Ok(reference)
    }
}
