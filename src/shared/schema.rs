diesel::table! {
    organizations (id) {
        id -> Uuid,
        name -> Text,
        slug -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    departments (id) {
        id -> Uuid,
        organization_id -> Uuid,
        name -> Text,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    employees (id) {
        id -> Uuid,
        organization_id -> Uuid,
        department_id -> Nullable<Uuid>,
        email -> Text,
        password_hash -> Text,
        first_name -> Text,
        last_name -> Text,
        role -> Text,
        position -> Nullable<Text>,
        is_active -> Bool,
        deleted_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    teams (id) {
        id -> Uuid,
        organization_id -> Uuid,
        department_id -> Nullable<Uuid>,
        name -> Text,
        manager_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    team_members (id) {
        id -> Uuid,
        team_id -> Uuid,
        employee_id -> Uuid,
        added_at -> Timestamptz,
    }
}

diesel::table! {
    parameters (id) {
        id -> Uuid,
        organization_id -> Nullable<Uuid>,
        name -> Text,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    performance_matrices (id) {
        id -> Uuid,
        organization_id -> Uuid,
        name -> Text,
        description -> Nullable<Text>,
        status -> Text,
        version -> Int4,
        previous_version_id -> Nullable<Uuid>,
        created_by -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    matrix_parameters (id) {
        id -> Uuid,
        matrix_id -> Uuid,
        parameter_id -> Uuid,
        weightage -> Int4,
    }
}

diesel::table! {
    evaluation_cycles (id) {
        id -> Uuid,
        organization_id -> Uuid,
        name -> Text,
        description -> Nullable<Text>,
        start_date -> Date,
        end_date -> Date,
        status -> Text,
        created_by -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    cycle_team_assignments (id) {
        id -> Uuid,
        cycle_id -> Uuid,
        team_id -> Uuid,
        matrix_id -> Uuid,
        manager_id -> Uuid,
        assigned_at -> Timestamptz,
    }
}

diesel::table! {
    evaluations (id) {
        id -> Uuid,
        assignment_id -> Uuid,
        employee_id -> Uuid,
        manager_id -> Uuid,
        status -> Text,
        overall_score -> Nullable<Double>,
        submitted_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    evaluation_details (id) {
        id -> Uuid,
        evaluation_id -> Uuid,
        parameter_id -> Uuid,
        score -> Nullable<Double>,
        comments -> Nullable<Text>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    evaluation_status (id) {
        id -> Uuid,
        evaluation_id -> Uuid,
        parameter_id -> Uuid,
        status -> Text,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    notifications (id) {
        id -> Uuid,
        organization_id -> Uuid,
        recipient_id -> Uuid,
        notification_type -> Text,
        title -> Text,
        message -> Text,
        metadata -> Jsonb,
        action_url -> Nullable<Text>,
        priority -> Text,
        is_read -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(departments -> organizations (organization_id));
diesel::joinable!(teams -> organizations (organization_id));
diesel::joinable!(team_members -> teams (team_id));
diesel::joinable!(team_members -> employees (employee_id));
diesel::joinable!(matrix_parameters -> performance_matrices (matrix_id));
diesel::joinable!(matrix_parameters -> parameters (parameter_id));
diesel::joinable!(cycle_team_assignments -> evaluation_cycles (cycle_id));
diesel::joinable!(cycle_team_assignments -> teams (team_id));
diesel::joinable!(cycle_team_assignments -> performance_matrices (matrix_id));
diesel::joinable!(evaluations -> cycle_team_assignments (assignment_id));
diesel::joinable!(evaluation_details -> evaluations (evaluation_id));
diesel::joinable!(evaluation_details -> parameters (parameter_id));
diesel::joinable!(evaluation_status -> evaluations (evaluation_id));
diesel::joinable!(evaluation_status -> parameters (parameter_id));

diesel::allow_tables_to_appear_in_same_query!(
    organizations,
    departments,
    employees,
    teams,
    team_members,
    parameters,
    performance_matrices,
    matrix_parameters,
    evaluation_cycles,
    cycle_team_assignments,
    evaluations,
    evaluation_details,
    evaluation_status,
    notifications,
);
