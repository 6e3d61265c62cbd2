use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Stream of the values given to [`Published::publish`], starting with the current one
pub type Watcher<T> = WatchStream<T>;

/// Latest value of something that others may want to follow
pub struct Published<T> {
    tx: watch::Sender<T>,
}

impl<T> Published<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(v: T) -> Self {
        let (tx, _) = watch::channel(v);
        Self { tx }
    }

    pub fn publish(&self, v: T) {
        // kept even when nobody is subscribed
        self.tx.send_replace(v);
    }

    pub fn subscribe(&self) -> Watcher<T> {
        WatchStream::new(self.tx.subscribe())
    }
}
