pub(crate) mod history;
pub(crate) mod incident;

pub(crate) use history::HistoryRepository;
pub(crate) use incident::IncidentRepository;
