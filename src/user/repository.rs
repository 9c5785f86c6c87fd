use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::r2d2::ConnectionManager;
use uuid::Uuid;

use crate::schema::{patient_doctors, patients, users};

use super::Id;
use super::model::{Profile, User};

pub trait UserRepository {
    fn find_profile(&self, id: &Id) -> super::Result<Option<Profile>>;

    fn find_patient_full_name(&self, id: &Id) -> super::Result<Option<String>>;

    fn find_assigned_doctor(&self, patient: &Id) -> super::Result<Option<Id>>;
}

pub struct PgUserRepository {
    pool: r2d2::Pool<ConnectionManager<PgConnection>>,
}

impl PgUserRepository {
    pub fn new(pool: r2d2::Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }
}

impl UserRepository for PgUserRepository {
    fn find_profile(&self, id: &Id) -> super::Result<Option<Profile>> {
        let mut conn = self.pool.get()?;

        let u = users::table
            .find(id.get())
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(u.map(Profile::from))
    }

    fn find_patient_full_name(&self, id: &Id) -> super::Result<Option<String>> {
        let mut conn = self.pool.get()?;

        let full_name = patients::table
            .find(id.get())
            .select(patients::full_name)
            .first::<Option<String>>(&mut conn)
            .optional()?;

        Ok(full_name.flatten())
    }

    fn find_assigned_doctor(&self, patient: &Id) -> super::Result<Option<Id>> {
        let mut conn = self.pool.get()?;

        let doctor = patient_doctors::table
            .filter(patient_doctors::patient_id.eq(patient.get()))
            .select(patient_doctors::doctor_id)
            .first::<Uuid>(&mut conn)
            .optional()?;

        Ok(doctor.map(Id::from))
    }
}
