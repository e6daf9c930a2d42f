//! Schema migrations.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m202503010001_create_tables::Migration)]
    }
}

#[derive(DeriveIden)]
enum Students {
    Table,
    MatricNumber,
    FullName,
    Email,
}

#[derive(DeriveIden)]
enum Lecturers {
    Table,
    Id,
    Name,
    Email,
    Department,
}

#[derive(DeriveIden)]
enum Courses {
    Table,
    CourseCode,
    CourseName,
    CourseCredits,
    Semester,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CourseLecturers {
    Table,
    LecturerId,
    CourseCode,
}

#[derive(DeriveIden)]
enum Enrollments {
    Table,
    MatricNumber,
    CourseCode,
}

#[derive(DeriveIden)]
enum SessionCodes {
    Table,
    Id,
    CourseCode,
    LecturerId,
    GeneratedAt,
    Latitude,
    Longitude,
    RateWindowStart,
    Url,
}

#[derive(DeriveIden)]
enum AttendanceRecords {
    Table,
    Id,
    MatricNumber,
    CourseCode,
    RecordedAt,
    Status,
    GeoLocation,
    WindowStart,
}

mod m202503010001_create_tables {
    use super::{
        AttendanceRecords, CourseLecturers, Courses, Enrollments, Lecturers, SessionCodes,
        Students,
    };
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m202503010001_create_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Students::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Students::MatricNumber)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Students::FullName).string().not_null())
                        .col(ColumnDef::new(Students::Email).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Lecturers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Lecturers::Id)
                                .big_integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Lecturers::Name).string().not_null())
                        .col(ColumnDef::new(Lecturers::Email).string().not_null())
                        .col(ColumnDef::new(Lecturers::Department).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Courses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Courses::CourseCode)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Courses::CourseName).string().not_null())
                        .col(ColumnDef::new(Courses::CourseCredits).integer().not_null())
                        .col(ColumnDef::new(Courses::Semester).string().not_null())
                        .col(
                            ColumnDef::new(Courses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CourseLecturers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CourseLecturers::LecturerId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CourseLecturers::CourseCode).string().not_null())
                        .primary_key(
                            Index::create()
                                .col(CourseLecturers::LecturerId)
                                .col(CourseLecturers::CourseCode),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(CourseLecturers::Table, CourseLecturers::LecturerId)
                                .to(Lecturers::Table, Lecturers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(CourseLecturers::Table, CourseLecturers::CourseCode)
                                .to(Courses::Table, Courses::CourseCode)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Enrollments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Enrollments::MatricNumber).string().not_null())
                        .col(ColumnDef::new(Enrollments::CourseCode).string().not_null())
                        .primary_key(
                            Index::create()
                                .col(Enrollments::MatricNumber)
                                .col(Enrollments::CourseCode),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(Enrollments::Table, Enrollments::MatricNumber)
                                .to(Students::Table, Students::MatricNumber)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(Enrollments::Table, Enrollments::CourseCode)
                                .to(Courses::Table, Courses::CourseCode)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SessionCodes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SessionCodes::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(SessionCodes::CourseCode).string().not_null())
                        .col(
                            ColumnDef::new(SessionCodes::LecturerId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SessionCodes::GeneratedAt)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SessionCodes::Latitude).double().not_null())
                        .col(ColumnDef::new(SessionCodes::Longitude).double().not_null())
                        .col(
                            ColumnDef::new(SessionCodes::RateWindowStart)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SessionCodes::Url).text().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .from(SessionCodes::Table, SessionCodes::CourseCode)
                                .to(Courses::Table, Courses::CourseCode)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .index(
                            Index::create()
                                .name("uq_session_codes_window")
                                .col(SessionCodes::CourseCode)
                                .col(SessionCodes::LecturerId)
                                .col(SessionCodes::RateWindowStart)
                                .unique(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AttendanceRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AttendanceRecords::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(AttendanceRecords::MatricNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AttendanceRecords::CourseCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AttendanceRecords::RecordedAt)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AttendanceRecords::Status).string().not_null())
                        .col(ColumnDef::new(AttendanceRecords::GeoLocation).string())
                        .col(
                            ColumnDef::new(AttendanceRecords::WindowStart)
                                .big_integer()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(AttendanceRecords::Table, AttendanceRecords::MatricNumber)
                                .to(Students::Table, Students::MatricNumber)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .from(AttendanceRecords::Table, AttendanceRecords::CourseCode)
                                .to(Courses::Table, Courses::CourseCode)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .index(
                            Index::create()
                                .name("uq_attendance_records_window")
                                .col(AttendanceRecords::MatricNumber)
                                .col(AttendanceRecords::CourseCode)
                                .col(AttendanceRecords::WindowStart)
                                .unique(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_session_codes_course_generated")
                        .table(SessionCodes::Table)
                        .col(SessionCodes::CourseCode)
                        .col(SessionCodes::GeneratedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_attendance_records_course_window")
                        .table(AttendanceRecords::Table)
                        .col(AttendanceRecords::CourseCode)
                        .col(AttendanceRecords::WindowStart)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AttendanceRecords::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SessionCodes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Enrollments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CourseLecturers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Courses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Lecturers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Students::Table).to_owned())
                .await
        }
    }
}
