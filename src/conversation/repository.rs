use std::collections::HashMap;

use diesel::BoolExpressionMethods;
use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::r2d2::ConnectionManager;
use uuid::Uuid;

use crate::message::model::LastMessage;
use crate::schema::{conversation_participants, conversations};
use crate::user;

use super::model::{Conversation, ConversationRecord, NewConversation, ParticipantRecord};
use super::{Id, Participant};

pub trait ConversationRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<Conversation>>;

    /// Returns the single direct conversation of the pair, creating it with
    /// `seed` as its summary when none exists yet.
    fn find_or_create_direct(
        &self,
        patient: &user::Id,
        doctor: &user::Id,
        seed: &LastMessage,
    ) -> super::Result<Conversation>;

    /// Every conversation the user is a member of, of any kind, in creation
    /// order.
    fn find_by_member(&self, user: &user::Id) -> super::Result<Vec<Conversation>>;

    fn create_group(
        &self,
        name: &str,
        participants: &[Participant],
        seed: &LastMessage,
    ) -> super::Result<Conversation>;

    fn remove_participant(&self, id: &Id, user: &user::Id) -> super::Result<bool>;
}

pub struct PgConversationRepository {
    pool: r2d2::Pool<ConnectionManager<PgConnection>>,
}

impl PgConversationRepository {
    pub fn new(pool: r2d2::Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }
}

impl PgConversationRepository {
    fn load_participants(
        conn: &mut PgConnection,
        ids: &[Uuid],
    ) -> super::Result<HashMap<Uuid, Vec<Participant>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let records = conversation_participants::table
            .filter(conversation_participants::conversation_id.eq_any(ids))
            .order((
                conversation_participants::conversation_id.asc(),
                conversation_participants::position.asc(),
            ))
            .select(ParticipantRecord::as_select())
            .load(conn)?;

        let mut participants: HashMap<Uuid, Vec<Participant>> = HashMap::new();
        for r in records {
            participants
                .entry(*r.conversation_id())
                .or_default()
                .push(Participant::from(r));
        }

        Ok(participants)
    }

    fn assemble(
        conn: &mut PgConnection,
        records: Vec<ConversationRecord>,
    ) -> super::Result<Vec<Conversation>> {
        let group_ids = records
            .iter()
            .filter(|r| r.is_group())
            .map(|r| *r.id())
            .collect::<Vec<_>>();

        let mut participants = Self::load_participants(conn, &group_ids)?;

        let conversations = records
            .into_iter()
            .map(|r| {
                let p = participants.remove(r.id()).unwrap_or_default();
                r.into_conversation(p)
            })
            .collect();

        Ok(conversations)
    }
}

impl ConversationRepository for PgConversationRepository {
    fn find_by_id(&self, id: &Id) -> super::Result<Option<Conversation>> {
        let mut conn = self.pool.get()?;

        let record = conversations::table
            .find(id.get())
            .select(ConversationRecord::as_select())
            .first(&mut conn)
            .optional()?;

        match record {
            Some(r) => Ok(Self::assemble(&mut conn, vec![r])?.pop()),
            None => Ok(None),
        }
    }

    fn find_or_create_direct(
        &self,
        patient: &user::Id,
        doctor: &user::Id,
        seed: &LastMessage,
    ) -> super::Result<Conversation> {
        let mut conn = self.pool.get()?;

        let id = Id::random();
        let new_conversation = NewConversation::direct(&id, patient, doctor, seed);

        let record = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::insert_into(conversations::table)
                .values(&new_conversation)
                .on_conflict((conversations::patient_id, conversations::doctor_id))
                .do_nothing()
                .execute(conn)?;

            conversations::table
                .filter(conversations::patient_id.eq(patient.get()))
                .filter(conversations::doctor_id.eq(doctor.get()))
                .select(ConversationRecord::as_select())
                .first(conn)
        })?;

        Ok(record.into_conversation(vec![]))
    }

    fn find_by_member(&self, user: &user::Id) -> super::Result<Vec<Conversation>> {
        let mut conn = self.pool.get()?;

        let group_ids = conversation_participants::table
            .filter(conversation_participants::user_id.eq(user.get()))
            .select(conversation_participants::conversation_id);

        let records = conversations::table
            .filter(
                conversations::patient_id
                    .eq(user.get())
                    .or(conversations::doctor_id.eq(user.get()))
                    .or(conversations::id.eq_any(group_ids)),
            )
            .order(conversations::seq.asc())
            .select(ConversationRecord::as_select())
            .load(&mut conn)?;

        Self::assemble(&mut conn, records)
    }

    fn create_group(
        &self,
        name: &str,
        participants: &[Participant],
        seed: &LastMessage,
    ) -> super::Result<Conversation> {
        let mut conn = self.pool.get()?;

        let id = Id::random();
        let participant_records = participants
            .iter()
            .zip(0..)
            .map(|(p, position)| ParticipantRecord::new(&id, p, position))
            .collect::<Vec<_>>();

        let record = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let record = diesel::insert_into(conversations::table)
                .values(&NewConversation::group(&id, name, seed))
                .returning(ConversationRecord::as_returning())
                .get_result(conn)?;

            diesel::insert_into(conversation_participants::table)
                .values(&participant_records)
                .execute(conn)?;

            Ok(record)
        })?;

        Ok(record.into_conversation(participants.to_vec()))
    }

    fn remove_participant(&self, id: &Id, user: &user::Id) -> super::Result<bool> {
        let mut conn = self.pool.get()?;

        let deleted = diesel::delete(
            conversation_participants::table.filter(
                conversation_participants::conversation_id
                    .eq(id.get())
                    .and(conversation_participants::user_id.eq(user.get())),
            ),
        )
        .execute(&mut conn)?;

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use crate::conversation::model::Details;
    use crate::integration::db::tests::TestContainer;
    use crate::user::Role;

    use super::*;

    fn seed() -> LastMessage {
        LastMessage::new("Xin chào", Utc::now())
    }

    #[tokio::test]
    #[ignore = "requires a docker daemon"]
    async fn should_create_direct_conversation_once() {
        let tc = TestContainer::init().await;
        let repo = PgConversationRepository::new(tc.pool.clone());

        let patient = user::Id::random();
        let doctor = user::Id::random();

        let first = repo.find_or_create_direct(&patient, &doctor, &seed()).unwrap();
        let second = repo.find_or_create_direct(&patient, &doctor, &seed()).unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(repo.find_by_member(&patient).unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires a docker daemon"]
    async fn should_keep_direct_conversation_per_ordered_pair() {
        let tc = TestContainer::init().await;
        let repo = PgConversationRepository::new(tc.pool.clone());

        let patient = user::Id::random();
        let doctor = user::Id::random();

        let created = repo.find_or_create_direct(&patient, &doctor, &seed()).unwrap();
        let swapped = repo.find_or_create_direct(&doctor, &patient, &seed()).unwrap();

        assert_ne!(created.id(), swapped.id());
        let found = repo.find_by_id(created.id()).unwrap().unwrap();
        assert_eq!(found.id(), created.id());
    }

    #[tokio::test]
    #[ignore = "requires a docker daemon"]
    async fn should_keep_participant_order_after_leave() {
        let tc = TestContainer::init().await;
        let repo = PgConversationRepository::new(tc.pool.clone());

        let doctor = Participant::new(user::Id::random(), Role::Doctor);
        let p1 = Participant::new(user::Id::random(), Role::Patient);
        let p2 = Participant::new(user::Id::random(), Role::Patient);

        let group = repo.create_group("Nhóm A", &[doctor, p1, p2], &seed()).unwrap();

        assert!(repo.remove_participant(group.id(), p1.user_id()).unwrap());
        assert!(!repo.remove_participant(group.id(), p1.user_id()).unwrap());

        let actual = repo.find_by_id(group.id()).unwrap().unwrap();
        assert_eq!(
            actual.details(),
            &Details::Group {
                name: "Nhóm A".into(),
                participants: vec![doctor, p2],
            }
        );
        assert!(repo.find_by_member(p1.user_id()).unwrap().is_empty());
        assert_eq!(repo.find_by_member(p2.user_id()).unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires a docker daemon"]
    async fn should_find_conversations_of_any_kind() {
        let tc = TestContainer::init().await;
        let repo = PgConversationRepository::new(tc.pool.clone());

        let doctor = user::Id::random();
        let patient = user::Id::random();

        repo.find_or_create_direct(&patient, &doctor, &seed()).unwrap();
        repo.create_group(
            "Nhóm B",
            &[
                Participant::new(doctor, Role::Doctor),
                Participant::new(patient, Role::Patient),
                Participant::new(user::Id::random(), Role::Patient),
            ],
            &seed(),
        )
        .unwrap();

        let found = repo.find_by_member(&doctor).unwrap();

        assert_eq!(found.len(), 2);
        assert!(found[0].seq() < found[1].seq());
    }
}
