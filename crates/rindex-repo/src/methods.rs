//! Binding domain-specific query methods to a repository.
//!
//! Instead of scattering ad hoc predicates and indexing keys through calling
//! code, a collection's typed queries are built once, on top of the
//! repository primitives, by a factory passed to
//! [`Repository::with_methods`](crate::Repository::with_methods).

use std::ops::Deref;
use std::sync::Arc;

use rindex_index::QueryCache;
use rindex_store::KeyValueStore;

use crate::repository::Repository;

/// Everything a custom-methods factory may build on.
#[derive(Clone)]
pub struct MethodsContext {
    pub repository: Arc<Repository>,
    pub store: Arc<dyn KeyValueStore>,
    pub indexing: QueryCache,
    pub collection: String,
    pub name: String,
}

/// A repository together with its custom methods.
///
/// Dereferences to the [`Repository`], so the generic operations stay
/// available next to [`Collection::methods`].
pub struct Collection<M> {
    repository: Arc<Repository>,
    methods: M,
}

impl<M> Collection<M> {
    pub(crate) fn new(repository: Arc<Repository>, methods: M) -> Self {
        Self {
            repository,
            methods,
        }
    }

    /// The custom methods built by the factory.
    pub fn methods(&self) -> &M {
        &self.methods
    }

    /// A shared handle to the underlying repository.
    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }
}

impl<M> Deref for Collection<M> {
    type Target = Repository;

    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}

impl<M: std::fmt::Debug> std::fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("repository", &self.repository)
            .field("methods", &self.methods)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;
    use rindex_schema::{FieldType, Schema};
    use rindex_store::InMemoryKvStore;
    use rindex_types::Entity;

    struct TodoMethods {
        repo: Arc<Repository>,
    }

    impl TodoMethods {
        async fn open(&self) -> crate::RepoResult<Vec<Entity>> {
            self.repo
                .find("done=false", |e| e.get_bool("done") == Some(false))
                .await
        }
    }

    fn collection() -> Collection<TodoMethods> {
        let schema = Schema::new()
            .required("desc", FieldType::String)
            .required("done", FieldType::Boolean);
        Repository::new(
            RepositoryConfig::new("todos", schema).with_name("Todos"),
            Arc::new(InMemoryKvStore::new()),
        )
        .with_methods(|ctx| {
            assert_eq!(ctx.collection, "todos");
            assert_eq!(ctx.name, "Todos");
            assert_eq!(ctx.indexing.collection(), "todos");
            TodoMethods {
                repo: ctx.repository,
            }
        })
    }

    #[tokio::test]
    async fn methods_build_on_repository_primitives() {
        let todos = collection();
        todos
            .set(Entity::new().with_field("desc", "a").with_field("done", false))
            .await
            .unwrap();
        todos
            .set(Entity::new().with_field("desc", "b").with_field("done", true))
            .await
            .unwrap();

        let open = todos.methods().open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].get_str("desc"), Some("a"));
    }

    #[tokio::test]
    async fn collection_shares_the_repository() {
        let todos = collection();
        assert!(Arc::ptr_eq(todos.repository(), &todos.methods().repo));
        assert_eq!(todos.count().await.unwrap(), 0);
    }
}
