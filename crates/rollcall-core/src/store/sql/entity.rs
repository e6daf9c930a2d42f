//! SeaORM entities, one module per table.

pub mod student {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "students")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub matric_number: String,
        pub full_name: String,
        pub email: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod lecturer {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "lecturers")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        pub name: String,
        pub email: String,
        pub department: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod course {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "courses")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub course_code: String,
        pub course_name: String,
        pub course_credits: i32,
        pub semester: String,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod course_lecturer {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "course_lecturers")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub lecturer_id: i64,
        #[sea_orm(primary_key, auto_increment = false)]
        pub course_code: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::lecturer::Entity",
            from = "Column::LecturerId",
            to = "super::lecturer::Column::Id",
            on_delete = "Cascade"
        )]
        Lecturer,

        #[sea_orm(
            belongs_to = "super::course::Entity",
            from = "Column::CourseCode",
            to = "super::course::Column::CourseCode",
            on_delete = "Cascade"
        )]
        Course,
    }

    impl Related<super::lecturer::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Lecturer.def()
        }
    }

    impl Related<super::course::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Course.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod enrollment {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "enrollments")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub matric_number: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub course_code: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::student::Entity",
            from = "Column::MatricNumber",
            to = "super::student::Column::MatricNumber",
            on_delete = "Cascade"
        )]
        Student,

        #[sea_orm(
            belongs_to = "super::course::Entity",
            from = "Column::CourseCode",
            to = "super::course::Column::CourseCode",
            on_delete = "Cascade"
        )]
        Course,
    }

    impl Related<super::student::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Student.def()
        }
    }

    impl Related<super::course::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Course.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod session_code {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "session_codes")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub course_code: String,
        pub lecturer_id: i64,
        /// Epoch milliseconds.
        pub generated_at: i64,
        #[sea_orm(column_type = "Double")]
        pub latitude: f64,
        #[sea_orm(column_type = "Double")]
        pub longitude: f64,
        /// Epoch milliseconds.
        pub rate_window_start: i64,
        pub url: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::course::Entity",
            from = "Column::CourseCode",
            to = "super::course::Column::CourseCode",
            on_delete = "Cascade"
        )]
        Course,
    }

    impl Related<super::course::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Course.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod attendance_record {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "attendance_records")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub matric_number: String,
        pub course_code: String,
        /// Epoch milliseconds.
        pub recorded_at: i64,
        pub status: String,
        pub geo_location: Option<String>,
        /// Epoch milliseconds.
        pub window_start: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::student::Entity",
            from = "Column::MatricNumber",
            to = "super::student::Column::MatricNumber",
            on_delete = "Cascade"
        )]
        Student,

        #[sea_orm(
            belongs_to = "super::course::Entity",
            from = "Column::CourseCode",
            to = "super::course::Column::CourseCode",
            on_delete = "Cascade"
        )]
        Course,
    }

    impl Related<super::student::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Student.def()
        }
    }

    impl Related<super::course::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Course.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}
