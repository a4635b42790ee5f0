use bytes::Bytes;
use donation_engine::events::DonationsUpdated;

/// Formats an update as a server-sent event frame.
pub fn sse_event(event: &DonationsUpdated) -> Result<Bytes, serde_json::Error> {
    let data = serde_json::to_string(event)?;
    Ok(Bytes::from(format!("event: {}\ndata: {data}\n\n", event.event_name())))
}
