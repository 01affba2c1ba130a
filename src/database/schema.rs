diesel::table! {
    probes_t (id) {
        id -> Integer,
        label -> Text,
        nominal_type -> Integer,
        pin -> Integer,
        location -> Text,
        disabled -> Bool,
        pair_id -> Nullable<Integer>,
        relay_id -> Nullable<Integer>,
        low_threshold -> Nullable<Double>,
        high_threshold -> Nullable<Double>,
        delta -> Nullable<Double>,
        wire_resistance -> Nullable<Double>,
        correction_resistance -> Nullable<Double>,
    }
}

diesel::table! {
    relays_t (id) {
        id -> Integer,
        label -> Text,
        pin -> Integer,
        disabled -> Bool,
        fire_on_threshold -> Bool,
    }
}

diesel::table! {
    samples_t (id) {
        id -> Integer,
        probe_id -> Integer,
        temperature -> Double,
        recorded_at -> Timestamp,
    }
}

diesel::joinable!(samples_t -> probes_t (probe_id));
diesel::joinable!(probes_t -> relays_t (relay_id));

diesel::allow_tables_to_appear_in_same_query!(probes_t, relays_t, samples_t,);
