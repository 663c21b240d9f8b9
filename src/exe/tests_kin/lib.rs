mod fixtures;
mod pose_scenarios;
mod graph_scenarios;
