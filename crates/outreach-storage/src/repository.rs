//! Repository layer for data access

pub mod campaigns;
pub mod contacts;
pub mod outgoing_messages;
pub mod rules;
pub mod templates;

pub use campaigns::CampaignRepository;
pub use contacts::ContactRepository;
pub use outgoing_messages::OutgoingMessageRepository;
pub use rules::RuleRepository;
pub use templates::TemplateRepository;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::DatabasePool;
    use crate::models::{Campaign, Contact, CreateCampaign, CreateContact};
    use crate::repository::{CampaignRepository, ContactRepository};

    pub async fn test_db() -> DatabasePool {
        let db = DatabasePool::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    pub async fn contact(db: &DatabasePool, phone: &str, name: &str) -> Contact {
        ContactRepository::new(db.clone())
            .create(
                CreateContact {
                    phone: phone.to_string(),
                    name: name.to_string(),
                    ..Default::default()
                },
                "+593",
            )
            .await
            .unwrap()
    }

    pub async fn campaign(db: &DatabasePool, name: &str) -> Campaign {
        CampaignRepository::new(db.clone())
            .create(CreateCampaign {
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }
}
