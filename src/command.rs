use futures::{
    FutureExt, Stream, StreamExt,
    stream::{BoxStream, select_all},
};

/// A command that can be executed to perform side effects.
///
/// Commands represent asynchronous operations that produce messages, such as
/// fetching a query, running a mutation or touching the shared cache. They are
/// returned from controller methods and executed by the application loop, which
/// feeds every produced message back into its update function.
///
/// # Examples
///
/// ```
/// use tears_query::command::Command;
///
/// enum Message {
///     GotResult(i32),
/// }
///
/// let cmd = Command::perform(async { 42 }, Message::GotResult);
/// ```
pub struct Command<Msg: Send + 'static> {
    pub(crate) stream: Option<BoxStream<'static, Msg>>,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// Create a command that does nothing.
    ///
    /// ```
    /// use tears_query::command::Command;
    ///
    /// let cmd: Command<i32> = Command::none();
    /// assert!(cmd.is_none());
    /// ```
    pub fn none() -> Self {
        Self { stream: None }
    }

    /// Perform an asynchronous operation and convert its result to a message.
    ///
    /// # Examples
    ///
    /// ```
    /// use tears_query::command::Command;
    ///
    /// async fn fetch_data() -> String {
    ///     "data".to_string()
    /// }
    ///
    /// enum Message {
    ///     DataReceived(String),
    /// }
    ///
    /// let cmd = Command::perform(fetch_data(), Message::DataReceived);
    /// ```
    pub fn perform<A>(
        future: impl Future<Output = A> + Send + 'static,
        f: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::future(future.map(f))
    }

    /// Create a command from a future that produces a message.
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(future.into_stream().boxed()),
        }
    }

    /// Create a command that runs a future for its side effect only.
    ///
    /// The command completes without producing any message.
    pub fn effect(future: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            stream: Some(
                future
                    .into_stream()
                    .filter_map(|()| async { None })
                    .boxed(),
            ),
        }
    }

    /// Batch multiple commands into a single command.
    ///
    /// All commands will be executed concurrently. The order in which
    /// messages arrive is not guaranteed. Commands that are `Command::none()`
    /// are filtered out.
    pub fn batch(commands: impl IntoIterator<Item = Command<Msg>>) -> Self {
        let streams: Vec<_> = commands.into_iter().filter_map(|cmd| cmd.stream).collect();

        if streams.is_empty() {
            Self::none()
        } else {
            Self {
                stream: Some(select_all(streams).boxed()),
            }
        }
    }

    /// Create a command from a stream of messages.
    pub fn stream(stream: impl Stream<Item = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(stream.boxed()),
        }
    }

    /// Transform every message produced by this command.
    ///
    /// ```
    /// use tears_query::command::Command;
    ///
    /// enum Message {
    ///     Loaded(u32),
    /// }
    ///
    /// let cmd = Command::future(async { 7 }).map(Message::Loaded);
    /// ```
    pub fn map<U, F>(self, f: F) -> Command<U>
    where
        U: Send + 'static,
        F: Fn(Msg) -> U + Send + 'static,
    {
        Command {
            stream: self.stream.map(|stream| stream.map(f).boxed()),
        }
    }

    /// Returns `true` if this command performs nothing.
    pub const fn is_none(&self) -> bool {
        self.stream.is_none()
    }

    /// Consume the command, returning the underlying message stream.
    pub fn into_stream(self) -> Option<BoxStream<'static, Msg>> {
        self.stream
    }

    /// Drive the command to completion and collect every message it produces.
    pub async fn collect(self) -> Vec<Msg> {
        match self.stream {
            Some(stream) => stream.collect().await,
            None => Vec::new(),
        }
    }
}
