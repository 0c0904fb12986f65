mod clock;
mod cycle;
mod device;
mod host;
mod notify;
mod reconcile;
#[cfg(test)]
mod testing;
mod traits;
mod weather;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
