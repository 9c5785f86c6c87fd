use axum::http::StatusCode;

impl From<super::Error> for StatusCode {
    fn from(e: super::Error) -> Self {
        match e {
            super::Error::Unassigned(_) | super::Error::InvalidInput(_) => Self::BAD_REQUEST,
            super::Error::NotFound(_) => Self::NOT_FOUND,
            super::Error::Forbidden(_) => Self::FORBIDDEN,
            super::Error::InvalidState(_) => Self::CONFLICT,
            super::Error::_User(_) | super::Error::_Conversation(_) | super::Error::_Message(_) => {
                Self::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub(super) mod api {
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::{Extension, Json};
    use serde::Deserialize;
    use serde_json::json;

    use crate::consultation::model::{ConversationSummary, LeftGroup, MessageView};
    use crate::consultation::service::ConsultationService;
    use crate::message::model::{Attachment, Window};
    use crate::user::{self, Role};
    use crate::{auth, consultation, conversation, event};

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SendParams {
        #[serde(default)]
        content: String,
        conversation_id: Option<conversation::Id>,
        #[serde(default)]
        attachments: Vec<Attachment>,
    }

    pub async fn send(
        Extension(auth_user): Extension<auth::User>,
        consultation_service: State<consultation::Service>,
        event_service: State<event::Service>,
        Json(params): Json<SendParams>,
    ) -> crate::Result<impl IntoResponse> {
        let sent = match (params.conversation_id, auth_user.role()) {
            (Some(id), _) => {
                consultation_service
                    .send_message(
                        &auth_user.participant(),
                        &id,
                        &params.content,
                        params.attachments,
                    )
                    .await
            }
            (None, Role::Patient) => {
                consultation_service
                    .send_as_patient(auth_user.id(), &params.content, params.attachments)
                    .await
            }
            (None, Role::Doctor) => Err(consultation::Error::InvalidInput(
                "conversation ID is required",
            )),
        }?;

        event::notify::message_sent(&event_service, &sent).await;

        Ok((StatusCode::CREATED, Json(sent)))
    }

    #[derive(Deserialize)]
    pub struct ReplyParams {
        #[serde(default)]
        content: String,
        #[serde(default)]
        attachments: Vec<Attachment>,
    }

    pub async fn reply(
        Extension(auth_user): Extension<auth::User>,
        consultation_service: State<consultation::Service>,
        event_service: State<event::Service>,
        Path(id): Path<conversation::Id>,
        Json(params): Json<ReplyParams>,
    ) -> crate::Result<impl IntoResponse> {
        require_doctor(&auth_user)?;

        let sent = consultation_service
            .send_as_doctor(auth_user.id(), &id, &params.content, params.attachments)
            .await?;

        event::notify::message_sent(&event_service, &sent).await;

        Ok((StatusCode::CREATED, Json(sent)))
    }

    pub async fn find_messages(
        Extension(auth_user): Extension<auth::User>,
        consultation_service: State<consultation::Service>,
        Path(id): Path<conversation::Id>,
        Query(window): Query<Window>,
    ) -> crate::Result<Json<Vec<MessageView>>> {
        let messages = consultation_service
            .get_messages(auth_user.id(), &id, &window)
            .await?;

        Ok(Json(messages))
    }

    pub async fn mark_as_read(
        Extension(auth_user): Extension<auth::User>,
        consultation_service: State<consultation::Service>,
        Path(id): Path<conversation::Id>,
    ) -> crate::Result<impl IntoResponse> {
        let marked = consultation_service.mark_as_read(auth_user.id(), &id).await?;

        Ok(Json(json!({ "success": true, "marked": marked })))
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateGroupParams {
        group_name: String,
        patient_ids: Vec<user::Id>,
    }

    pub async fn create_group(
        Extension(auth_user): Extension<auth::User>,
        consultation_service: State<consultation::Service>,
        event_service: State<event::Service>,
        Json(params): Json<CreateGroupParams>,
    ) -> crate::Result<impl IntoResponse> {
        require_doctor(&auth_user)?;

        let group = consultation_service
            .create_group_conversation(auth_user.id(), &params.group_name, &params.patient_ids)
            .await?;

        event::notify::group_created(&event_service, &group).await;

        Ok((StatusCode::CREATED, Json(group)))
    }

    pub async fn doctor_inbox(
        Extension(auth_user): Extension<auth::User>,
        consultation_service: State<consultation::Service>,
    ) -> crate::Result<Json<Vec<ConversationSummary>>> {
        require_doctor(&auth_user)?;

        let inbox = consultation_service.get_doctor_inbox(auth_user.id()).await?;
        Ok(Json(inbox))
    }

    pub async fn patient_conversations(
        Extension(auth_user): Extension<auth::User>,
        consultation_service: State<consultation::Service>,
    ) -> crate::Result<Json<Vec<ConversationSummary>>> {
        let conversations = consultation_service
            .get_patient_conversations(auth_user.id())
            .await?;
        Ok(Json(conversations))
    }

    pub async fn leave_group(
        Extension(auth_user): Extension<auth::User>,
        consultation_service: State<consultation::Service>,
        event_service: State<event::Service>,
        Path(id): Path<conversation::Id>,
    ) -> crate::Result<Json<LeftGroup>> {
        let left = consultation_service.leave_group(auth_user.id(), &id).await?;

        event::notify::member_left(&event_service, auth_user.id(), &left).await;

        Ok(Json(left))
    }

    fn require_doctor(auth_user: &auth::User) -> consultation::Result<()> {
        if auth_user.is_doctor() {
            return Ok(());
        }

        Err(consultation::Error::Forbidden(format!(
            "{} is not a doctor",
            auth_user.id()
        )))
    }
}
