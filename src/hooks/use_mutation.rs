use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::Command;
use crate::query::{Mutation, MutationResult, MutationState, QueryCache, QueryError, QueryKey};

pub type MutationFn<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync>;

/// Produces the context passed to the other callbacks. Runs before the mutation.
pub type OnMutate<I, C> = Arc<dyn Fn(&I) -> C + Send + Sync>;

pub type OnSuccess<I, O, C> = Arc<dyn Fn(&O, &I, Option<&C>) + Send + Sync>;

/// Called with a mutation error. Its presence marks the error as handled.
pub type OnMutationError<I, C> = Arc<dyn Fn(&QueryError, &I, Option<&C>) + Send + Sync>;

/// Construction options for [`UseMutation`].
pub struct UseMutationOptions<I, O, C = ()> {
    mutation_fn: MutationFn<I, O>,
    on_mutate: Option<OnMutate<I, C>>,
    on_success: Option<OnSuccess<I, O, C>>,
    on_error: Option<OnMutationError<I, C>>,
    auto_refetch: bool,
    corresponding_key: Option<QueryKey>,
}

impl<I, O, C> UseMutationOptions<I, O, C>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    C: Send + Sync + 'static,
{
    pub fn new<F>(mutation_fn: F) -> Self
    where
        F: Fn(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync + 'static,
    {
        Self {
            mutation_fn: Arc::new(mutation_fn),
            on_mutate: None,
            on_success: None,
            on_error: None,
            auto_refetch: false,
            corresponding_key: None,
        }
    }

    #[must_use]
    pub fn on_mutate(mut self, f: impl Fn(&I) -> C + Send + Sync + 'static) -> Self {
        self.on_mutate = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_success(mut self, f: impl Fn(&O, &I, Option<&C>) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Handles mutation errors with `f` instead of re-raising them.
    #[must_use]
    pub fn on_error(
        mut self,
        f: impl Fn(&QueryError, &I, Option<&C>) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Invalidate the corresponding query key after every successful mutation.
    #[must_use]
    pub const fn auto_refetch(mut self, auto_refetch: bool) -> Self {
        self.auto_refetch = auto_refetch;
        self
    }

    /// The query key refreshed when `auto_refetch` is on.
    #[must_use]
    pub fn corresponding_key(mut self, key: impl Into<QueryKey>) -> Self {
        self.corresponding_key = Some(key.into());
        self
    }
}

enum Outcome<O> {
    Success(O),
    Handled(QueryError),
    Unhandled(QueryError),
}

struct Mutator<I, O, C> {
    mutation_fn: MutationFn<I, O>,
    on_mutate: Option<OnMutate<I, C>>,
    on_success: Option<OnSuccess<I, O, C>>,
    on_error: Option<OnMutationError<I, C>>,
    invalidates: Option<QueryKey>,
    cache: Arc<dyn QueryCache>,
}

impl<I, O, C> Mutator<I, O, C>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    C: Send + Sync + 'static,
{
    async fn execute(self: Arc<Self>, input: I) -> Outcome<O> {
        let context = self.on_mutate.as_ref().map(|on_mutate| on_mutate(&input));

        match (self.mutation_fn)(input.clone()).await {
            Ok(output) => {
                if let Some(on_success) = &self.on_success {
                    on_success(&output, &input, context.as_ref());
                }
                if let Some(key) = &self.invalidates {
                    self.cache.invalidate_queries(key);
                }
                Outcome::Success(output)
            }
            Err(e) => match &self.on_error {
                Some(on_error) => {
                    on_error(&e, &input, context.as_ref());
                    Outcome::Handled(e)
                }
                None => Outcome::Unhandled(e),
            },
        }
    }
}

/// Handle for a write operation.
///
/// Callbacks run inside the mutation future. With `auto_refetch` and a
/// corresponding key, a successful mutation invalidates that key once, after
/// `on_success`.
pub struct UseMutation<I, O, C = ()> {
    mutator: Arc<Mutator<I, O, C>>,
    result: MutationResult<O>,
}

impl<I, O, C> UseMutation<I, O, C>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    C: Send + Sync + 'static,
{
    pub fn new(options: UseMutationOptions<I, O, C>, cache: Arc<dyn QueryCache>) -> Self {
        let UseMutationOptions {
            mutation_fn,
            on_mutate,
            on_success,
            on_error,
            auto_refetch,
            corresponding_key,
        } = options;

        Self {
            mutator: Arc::new(Mutator {
                mutation_fn,
                on_mutate,
                on_success,
                on_error,
                invalidates: corresponding_key.filter(|_| auto_refetch),
                cache,
            }),
            result: MutationResult::default(),
        }
    }

    /// Starts the mutation, marking the handle as loading.
    ///
    /// The command yields the final state. Failures are reported as an error
    /// state whether or not `on_error` handled them.
    pub fn mutate(&mut self, input: I) -> Command<MutationResult<O>> {
        self.result = MutationResult::new(MutationState::Loading);
        let mutator = self.mutator.clone();

        Mutation::mutate(input, move |input| {
            async move {
                match mutator.execute(input).await {
                    Outcome::Success(output) => Ok(output),
                    Outcome::Handled(e) | Outcome::Unhandled(e) => Err(e),
                }
            }
            .boxed()
        })
        .map(MutationResult::from)
    }

    /// Runs the mutation and returns its outcome directly.
    ///
    /// Resolves to `Ok(Some(output))` on success and `Ok(None)` when `on_error`
    /// handled a failure. Without `on_error`, the error is returned.
    pub fn mutate_async(&self, input: I) -> BoxFuture<'static, Result<Option<O>, QueryError>> {
        let mutator = self.mutator.clone();

        async move {
            match mutator.execute(input).await {
                Outcome::Success(output) => Ok(Some(output)),
                Outcome::Handled(_) => Ok(None),
                Outcome::Unhandled(e) => Err(e),
            }
        }
        .boxed()
    }

    /// Records a result produced by [`mutate`](Self::mutate).
    pub fn update(&mut self, result: MutationResult<O>) {
        self.result = result;
    }

    /// Returns the handle to idle.
    pub fn reset(&mut self) {
        self.result = MutationResult::default();
    }

    pub const fn result(&self) -> &MutationResult<O> {
        &self.result
    }

    pub const fn data(&self) -> Option<&O> {
        self.result.data()
    }

    pub const fn error(&self) -> Option<&QueryError> {
        self.result.error()
    }

    pub const fn is_loading(&self) -> bool {
        self.result.is_loading()
    }

    pub const fn is_success(&self) -> bool {
        self.result.is_success()
    }

    pub const fn is_error(&self) -> bool {
        self.result.is_error()
    }
}
