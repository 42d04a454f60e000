mod test_rejoin_without_leave;
