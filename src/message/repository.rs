use std::collections::HashSet;

use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::dsl::not;
use diesel::r2d2::ConnectionManager;
use uuid::Uuid;

use crate::conversation::{self, Kind};
use crate::schema::{conversations, message_reads, messages};
use crate::user;

use super::model::{Message, MessageRecord, NewMessage, NewMessageRecord, NewReceipt, Window};
use super::Id;

/// Read state is scoped by conversation kind: direct conversations share one
/// `read` flag per message, groups keep a receipt per reader.
pub trait MessageRepository {
    /// Stores the message and overwrites the conversation summary in one
    /// transaction.
    fn insert(&self, msg: &NewMessage) -> super::Result<Message>;

    /// History oldest first. `read` reflects the viewer's perspective.
    fn find_by_conversation(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
        window: &Window,
    ) -> super::Result<Vec<Message>>;

    fn count_unread(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
    ) -> super::Result<usize>;

    /// Marks every message of the conversation not sent by the viewer.
    fn mark_as_read(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
    ) -> super::Result<usize>;

    /// Marks only the given messages, skipping the viewer's own.
    fn mark_seen(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
        seen: &[super::Id],
    ) -> super::Result<usize>;
}

pub struct PgMessageRepository {
    pool: r2d2::Pool<ConnectionManager<PgConnection>>,
}

impl PgMessageRepository {
    pub fn new(pool: r2d2::Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }
}

impl PgMessageRepository {
    fn receipts_of(
        conn: &mut PgConnection,
        viewer: &user::Id,
        ids: &[Uuid],
    ) -> super::Result<HashSet<Uuid>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let read = message_reads::table
            .filter(message_reads::user_id.eq(viewer.get()))
            .filter(message_reads::message_id.eq_any(ids))
            .select(message_reads::message_id)
            .load::<Uuid>(conn)?;

        Ok(read.into_iter().collect())
    }

    fn insert_receipts(
        conn: &mut PgConnection,
        viewer: &user::Id,
        ids: Vec<Uuid>,
    ) -> super::Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let receipts = ids
            .into_iter()
            .map(|m| NewReceipt::new(m, viewer))
            .collect::<Vec<_>>();

        let inserted = diesel::insert_into(message_reads::table)
            .values(&receipts)
            .on_conflict_do_nothing()
            .execute(conn)?;
        Ok(inserted)
    }
}

impl MessageRepository for PgMessageRepository {
    fn insert(&self, msg: &NewMessage) -> super::Result<Message> {
        let mut conn = self.pool.get()?;

        let record = NewMessageRecord::new(msg)?;
        let summary = msg.summary();

        let inserted = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let inserted = diesel::insert_into(messages::table)
                .values(&record)
                .returning(MessageRecord::as_returning())
                .get_result(conn)?;

            diesel::update(conversations::table.find(msg.conversation_id().get()))
                .set((
                    conversations::last_message.eq(summary.text()),
                    conversations::last_message_at.eq(summary.at()),
                ))
                .execute(conn)?;

            Ok(inserted)
        })?;

        Message::try_from(inserted)
    }

    fn find_by_conversation(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
        window: &Window,
    ) -> super::Result<Vec<Message>> {
        let mut conn = self.pool.get()?;

        let mut query = messages::table
            .filter(messages::conversation_id.eq(id.get()))
            .select(MessageRecord::as_select())
            .into_boxed();

        if let Some(before) = window.before() {
            query = query.filter(messages::created_at.lt(*before));
        }

        let records = match window.limit() {
            Some(limit) => {
                let mut latest = query
                    .order((messages::created_at.desc(), messages::seq.desc()))
                    .limit(limit)
                    .load(&mut conn)?;
                latest.reverse();
                latest
            }
            None => query
                .order((messages::created_at.asc(), messages::seq.asc()))
                .load(&mut conn)?,
        };

        let receipts = match kind {
            Kind::Direct => HashSet::new(),
            Kind::Group => {
                let ids = records.iter().map(|r| *r.id()).collect::<Vec<_>>();
                Self::receipts_of(&mut conn, viewer, &ids)?
            }
        };

        records
            .into_iter()
            .map(|r| {
                let read_by_viewer = receipts.contains(r.id());
                let m = Message::try_from(r)?;
                match kind {
                    Kind::Direct => Ok(m),
                    Kind::Group => {
                        let read = read_by_viewer || m.sender_id() == viewer;
                        Ok(m.with_read(read))
                    }
                }
            })
            .collect()
    }

    fn count_unread(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
    ) -> super::Result<usize> {
        let mut conn = self.pool.get()?;

        let unread = messages::table
            .filter(messages::conversation_id.eq(id.get()))
            .filter(messages::sender_id.ne(viewer.get()));

        let count: i64 = match kind {
            Kind::Direct => unread
                .filter(messages::read.eq(false))
                .count()
                .get_result(&mut conn)?,
            Kind::Group => unread
                .filter(not(messages::id.eq_any(
                    message_reads::table
                        .filter(message_reads::user_id.eq(viewer.get()))
                        .select(message_reads::message_id),
                )))
                .count()
                .get_result(&mut conn)?,
        };

        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn mark_as_read(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
    ) -> super::Result<usize> {
        let mut conn = self.pool.get()?;

        let unread = messages::table
            .filter(messages::conversation_id.eq(id.get()))
            .filter(messages::sender_id.ne(viewer.get()));

        match kind {
            Kind::Direct => {
                let updated = diesel::update(unread.filter(messages::read.eq(false)))
                    .set(messages::read.eq(true))
                    .execute(&mut conn)?;
                Ok(updated)
            }
            Kind::Group => {
                let ids = unread
                    .filter(not(messages::id.eq_any(
                        message_reads::table
                            .filter(message_reads::user_id.eq(viewer.get()))
                            .select(message_reads::message_id),
                    )))
                    .select(messages::id)
                    .load::<Uuid>(&mut conn)?;

                Self::insert_receipts(&mut conn, viewer, ids)
            }
        }
    }

    fn mark_seen(
        &self,
        id: &conversation::Id,
        kind: Kind,
        viewer: &user::Id,
        seen: &[Id],
    ) -> super::Result<usize> {
        if seen.is_empty() {
            return Ok(0);
        }

        let mut conn = self.pool.get()?;

        let seen = seen.iter().map(|m| *m.get()).collect::<Vec<_>>();
        let unread = messages::table
            .filter(messages::conversation_id.eq(id.get()))
            .filter(messages::sender_id.ne(viewer.get()))
            .filter(messages::id.eq_any(seen));

        match kind {
            Kind::Direct => {
                let updated = diesel::update(unread.filter(messages::read.eq(false)))
                    .set(messages::read.eq(true))
                    .execute(&mut conn)?;
                Ok(updated)
            }
            Kind::Group => {
                let ids = unread.select(messages::id).load::<Uuid>(&mut conn)?;
                Self::insert_receipts(&mut conn, viewer, ids)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use crate::conversation::Participant;
    use crate::conversation::repository::{ConversationRepository, PgConversationRepository};
    use crate::integration::db::tests::TestContainer;
    use crate::message::model::{ATTACHMENT_PLACEHOLDER, Attachment, LastMessage};
    use crate::user::Role;

    use super::*;

    #[tokio::test]
    #[ignore = "requires a docker daemon"]
    async fn should_insert_and_update_summary() {
        let tc = TestContainer::init().await;
        let conversations = PgConversationRepository::new(tc.pool.clone());
        let repo = PgMessageRepository::new(tc.pool.clone());

        let patient = user::Id::random();
        let doctor = user::Id::random();
        let seed = LastMessage::new("", Utc::now());
        let c = conversations
            .find_or_create_direct(&patient, &doctor, &seed)
            .unwrap();

        let sender = Participant::new(patient, Role::Patient);
        let attachment = Attachment::new("https://cdn/x.png", "x.png", 10, "image/png");
        let msg = NewMessage::new(*c.id(), &sender, "", vec![attachment.clone()]);

        let stored = repo.insert(&msg).unwrap();

        assert!(!stored.read());
        assert_eq!(stored.attachments(), &[attachment]);

        let c = conversations.find_by_id(c.id()).unwrap().unwrap();
        assert_eq!(
            c.last_message().map(|m| m.text()),
            Some(ATTACHMENT_PLACEHOLDER)
        );
    }

    #[tokio::test]
    #[ignore = "requires a docker daemon"]
    async fn should_mark_direct_messages_as_read() {
        let tc = TestContainer::init().await;
        let conversations = PgConversationRepository::new(tc.pool.clone());
        let repo = PgMessageRepository::new(tc.pool.clone());

        let patient = user::Id::random();
        let doctor = user::Id::random();
        let seed = LastMessage::new("hi", Utc::now());
        let c = conversations
            .find_or_create_direct(&patient, &doctor, &seed)
            .unwrap();

        let sender = Participant::new(patient, Role::Patient);
        for text in ["a", "b", "c"] {
            repo.insert(&NewMessage::new(*c.id(), &sender, text, vec![]))
                .unwrap();
        }

        assert_eq!(repo.count_unread(c.id(), Kind::Direct, &doctor).unwrap(), 3);
        assert_eq!(repo.count_unread(c.id(), Kind::Direct, &patient).unwrap(), 0);

        assert_eq!(repo.mark_as_read(c.id(), Kind::Direct, &doctor).unwrap(), 3);
        assert_eq!(repo.count_unread(c.id(), Kind::Direct, &doctor).unwrap(), 0);

        let history = repo
            .find_by_conversation(c.id(), Kind::Direct, &doctor, &Window::default())
            .unwrap();
        let contents = history.iter().map(|m| m.content()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    #[ignore = "requires a docker daemon"]
    async fn should_track_group_reads_per_participant() {
        let tc = TestContainer::init().await;
        let conversations = PgConversationRepository::new(tc.pool.clone());
        let repo = PgMessageRepository::new(tc.pool.clone());

        let doctor = Participant::new(user::Id::random(), Role::Doctor);
        let p1 = Participant::new(user::Id::random(), Role::Patient);
        let p2 = Participant::new(user::Id::random(), Role::Patient);
        let seed = LastMessage::new("created", Utc::now());
        let c = conversations
            .create_group("Nhóm A", &[doctor, p1, p2], &seed)
            .unwrap();

        repo.insert(&NewMessage::new(*c.id(), &doctor, "hello", vec![]))
            .unwrap();

        repo.mark_as_read(c.id(), Kind::Group, p1.user_id()).unwrap();

        assert_eq!(repo.count_unread(c.id(), Kind::Group, p1.user_id()).unwrap(), 0);
        assert_eq!(repo.count_unread(c.id(), Kind::Group, p2.user_id()).unwrap(), 1);

        let seen_by_p2 = repo
            .find_by_conversation(c.id(), Kind::Group, p2.user_id(), &Window::default())
            .unwrap();
        assert!(!seen_by_p2[0].read());
    }

    #[tokio::test]
    #[ignore = "requires a docker daemon"]
    async fn should_mark_only_seen_messages() {
        let tc = TestContainer::init().await;
        let conversations = PgConversationRepository::new(tc.pool.clone());
        let repo = PgMessageRepository::new(tc.pool.clone());

        let patient = user::Id::random();
        let doctor = user::Id::random();
        let seed = LastMessage::new("hi", Utc::now());
        let c = conversations
            .find_or_create_direct(&patient, &doctor, &seed)
            .unwrap();

        let sender = Participant::new(patient, Role::Patient);
        let sent = ["a", "b", "c"]
            .into_iter()
            .map(|text| {
                repo.insert(&NewMessage::new(*c.id(), &sender, text, vec![]))
                    .unwrap()
            })
            .collect::<Vec<_>>();

        let marked = repo
            .mark_seen(c.id(), Kind::Direct, &doctor, &[*sent[2].id()])
            .unwrap();

        assert_eq!(marked, 1);
        assert_eq!(repo.count_unread(c.id(), Kind::Direct, &doctor).unwrap(), 2);
    }
}
