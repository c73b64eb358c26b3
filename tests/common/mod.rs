use rowstream::{EventData, Memory, Partition, PropertyMap, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposited {
    pub amount: i64,
    pub currency: String,
}

pub fn partition() -> (Memory, Partition) {
    let engine = Memory::new();
    let partition = Partition::new(engine.clone(), format!("account-{}", Uuid::new_v4()));

    (engine, partition)
}

pub fn deposited(amount: i64) -> EventData {
    let properties = PropertyMap::from_object(&Deposited {
        amount,
        currency: "EUR".to_owned(),
    })
    .expect("serializable payload");

    EventData::new().properties(properties)
}

pub fn plain_events(count: usize) -> Vec<EventData> {
    (0..count)
        .map(|i| EventData::new().property("Seq", Value::I64(i as i64)))
        .collect()
}
